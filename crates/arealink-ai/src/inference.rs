//! Name inference: asks an LLM for the English and local names of a batch
//! of regions and parses its JSON answer into candidates.

use arealink_core::{AdminLevel, EnrichmentCandidate};
use arealink_store::AreaRecord;
use arealink_sync::Cancelled;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed model output: {0}")]
    Malformed(String),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl InferenceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::Malformed(_) | Self::Cancelled(_) => false,
        }
    }
}

/// One region to name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameQuery {
    pub region_id: String,
    pub current_name: String,
    pub country_code: String,
    pub level: AdminLevel,
    pub parent_name: Option<String>,
}

impl NameQuery {
    pub fn from_record(record: &AreaRecord) -> Self {
        Self {
            region_id: record.id.clone(),
            current_name: record.name.clone(),
            country_code: record.country_code.clone(),
            level: record.level,
            parent_name: record.parent_name.clone(),
        }
    }
}

/// Produces name candidates for a batch. Candidates may come back in any
/// order and may omit regions; callers key them by `region_id`.
#[async_trait]
pub trait NameInference: Send + Sync {
    async fn infer_batch(
        &self,
        queries: &[NameQuery],
    ) -> Result<Vec<EnrichmentCandidate>, InferenceError>;
}

// ── Prompt templates ──

pub const SYSTEM_PROMPT: &str = "\
You are a gazetteer assistant that names administrative regions.

For each region you are given its id, its current (possibly romanised or abbreviated) name, \
its country (ISO 3166-1 alpha-3), its administrative level, and its parent region if known.

Respond ONLY with a JSON array. No markdown fences, no explanation, just raw JSON:
[
  {
    \"region_id\": \"the id exactly as given\",
    \"name_en\": \"the common English name, in Latin script\",
    \"name_local\": \"the official name in the country's own language and script\",
    \"confidence\": 0.0 to 1.0,
    \"reasoning\": \"one short sentence\"
  }
]

Return one object per region. If you do not recognise a region, still answer with your best \
guess and a low confidence. Never copy the region id into a name field.";

pub fn build_user_prompt(queries: &[NameQuery]) -> String {
    let mut prompt = format!("Name these {} regions:\n", queries.len());
    for q in queries {
        prompt.push_str(&format!(
            "\n- id: {id}\n  current name: {name}\n  country: {country}\n  level: {level}\n",
            id = q.region_id,
            name = q.current_name,
            country = q.country_code,
            level = q.level,
        ));
        if let Some(parent) = &q.parent_name {
            prompt.push_str(&format!("  parent: {parent}\n"));
        }
    }
    prompt
}

/// Parse model output into candidates. Tolerates a surrounding markdown
/// code fence and prose before or after the array.
pub fn parse_candidates(text: &str) -> Result<Vec<EnrichmentCandidate>, InferenceError> {
    let body = strip_fence(text.trim());
    let start = body.find('[');
    let end = body.rfind(']');
    let array = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => {
            let preview: String = text.chars().take(200).collect();
            return Err(InferenceError::Malformed(format!("no JSON array in: {preview}")));
        }
    };
    Ok(serde_json::from_str(array)?)
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Request body for the generate endpoint.
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub system_prompt: Option<&'a str>,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(default)]
    pub tokens_used: u32,
}

#[cfg(feature = "http")]
pub use http::HttpInference;

#[cfg(feature = "http")]
mod http {
    use super::*;

    use tracing::{debug, info};

    const TOKENS_PER_REGION: u32 = 160;

    /// Posts prompts to an LLM gateway exposing `POST {base}/v1/generate`.
    pub struct HttpInference {
        client: reqwest::Client,
        base_url: String,
        model: Option<String>,
    }

    impl HttpInference {
        pub fn new(base_url: String, model: Option<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.trim_end_matches('/').to_string(),
                model,
            }
        }
    }

    #[async_trait]
    impl NameInference for HttpInference {
        async fn infer_batch(
            &self,
            queries: &[NameQuery],
        ) -> Result<Vec<EnrichmentCandidate>, InferenceError> {
            if queries.is_empty() {
                return Ok(Vec::new());
            }
            let url = format!("{}/v1/generate", self.base_url);
            let request = GenerateRequest {
                system_prompt: Some(SYSTEM_PROMPT),
                user_prompt: build_user_prompt(queries),
                max_tokens: 256 + TOKENS_PER_REGION * queries.len() as u32,
                temperature: 0.0,
                model: self.model.as_deref(),
            };

            debug!(url = %url, regions = queries.len(), "requesting name inference");
            let resp = self.client.post(&url).json(&request).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(InferenceError::Server {
                    status: status.as_u16(),
                    body,
                });
            }

            let generated: GenerateResponse = resp.json().await?;
            let candidates = parse_candidates(&generated.text)?;
            info!(
                regions = queries.len(),
                candidates = candidates.len(),
                tokens = generated.tokens_used,
                "name inference complete"
            );
            Ok(candidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(id: &str, parent: Option<&str>) -> NameQuery {
        NameQuery {
            region_id: id.into(),
            current_name: "Jongno".into(),
            country_code: "KOR".into(),
            level: AdminLevel::Adm2,
            parent_name: parent.map(str::to_string),
        }
    }

    #[test]
    fn user_prompt_lists_every_region() {
        let prompt = build_user_prompt(&[query("A", Some("Seoul")), query("B", None)]);
        assert!(prompt.starts_with("Name these 2 regions:"));
        assert!(prompt.contains("- id: A"));
        assert!(prompt.contains("parent: Seoul"));
        assert!(prompt.contains("level: ADM2"));
        assert_eq!(prompt.matches("parent:").count(), 1);
    }

    #[test]
    fn parses_raw_array() {
        let text = r#"[{"region_id":"A","name_en":"Jongno-gu","name_local":"종로구","confidence":0.92,"reasoning":"Seoul district"}]"#;
        let c = parse_candidates(text).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].name_local, "종로구");
        assert_eq!(c[0].reasoning.as_deref(), Some("Seoul district"));
    }

    #[test]
    fn parses_fenced_array_with_prose() {
        let text = "```json\n[{\"region_id\":\"A\",\"name_en\":\"Jung-gu\",\"name_local\":\"중구\",\"confidence\":0.7}]\n```";
        assert_eq!(parse_candidates(text).unwrap()[0].name_en, "Jung-gu");

        let text = "Here you go:\n[]\nLet me know if you need more.";
        assert!(parse_candidates(text).unwrap().is_empty());
    }

    #[test]
    fn rejects_output_without_array() {
        assert!(matches!(
            parse_candidates("I cannot help with that."),
            Err(InferenceError::Malformed(_))
        ));
        assert!(matches!(parse_candidates("[{\"region_id\": 1}]"), Err(InferenceError::Json(_))));
    }

    #[test]
    fn request_serializes_expected_fields() {
        let req = GenerateRequest {
            system_prompt: Some("sys"),
            user_prompt: "user".into(),
            max_tokens: 512,
            temperature: 0.0,
            model: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["system_prompt"], "sys");
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("model").is_none());
    }

    #[test]
    fn retry_classification() {
        let server = |status| InferenceError::Server {
            status,
            body: String::new(),
        };
        assert!(server(502).is_retryable());
        assert!(!server(400).is_retryable());
        assert!(!InferenceError::Malformed("x".into()).is_retryable());
    }
}
