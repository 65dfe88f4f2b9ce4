//! Overpass API client for OSM administrative relations, fetched with
//! their tags and a computed center point.

use arealink_core::PointElement;
use async_trait::async_trait;
use serde::Deserialize;

use crate::SyncError;

#[async_trait]
pub trait PointSource: Send + Sync {
    /// Admin relations of a country at the given OSM `admin_level`.
    async fn fetch_elements(
        &self,
        country_iso3: &str,
        admin_level_hint: u8,
    ) -> Result<Vec<PointElement>, SyncError>;
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<PointElement>,
}

pub fn build_query(country_iso3: &str, admin_level: u8, timeout_secs: u32) -> String {
    format!(
        "[out:json][timeout:{timeout_secs}];\n\
         area[\"ISO3166-1:alpha3\"=\"{}\"][admin_level=2]->.country;\n\
         relation[\"boundary\"=\"administrative\"][\"admin_level\"=\"{admin_level}\"](area.country);\n\
         out tags center;",
        country_iso3.to_ascii_uppercase()
    )
}

pub fn parse_elements(body: &str) -> Result<Vec<PointElement>, SyncError> {
    let resp: OverpassResponse = serde_json::from_str(body)?;
    Ok(resp.elements)
}

#[cfg(feature = "http")]
pub use http::OverpassClient;

#[cfg(feature = "http")]
mod http {
    use super::*;

    use tokio_util::sync::CancellationToken;
    use tracing::info;

    use crate::retry::{RetryPolicy, retry};

    const QUERY_TIMEOUT_SECS: u32 = 180;

    pub struct OverpassClient {
        client: reqwest::Client,
        url: String,
        policy: RetryPolicy,
        cancel: CancellationToken,
    }

    impl OverpassClient {
        /// `url` is the interpreter endpoint, e.g. `https://overpass-api.de/api/interpreter`.
        pub fn new(url: String, policy: RetryPolicy, cancel: CancellationToken) -> Self {
            Self {
                client: reqwest::Client::new(),
                url,
                policy,
                cancel,
            }
        }

        async fn post_query(&self, query: &str) -> Result<String, SyncError> {
            let resp = self
                .client
                .post(&self.url)
                .form(&[("data", query)])
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SyncError::Server {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(resp.text().await?)
        }
    }

    #[async_trait]
    impl PointSource for OverpassClient {
        async fn fetch_elements(
            &self,
            country_iso3: &str,
            admin_level_hint: u8,
        ) -> Result<Vec<PointElement>, SyncError> {
            let query = build_query(country_iso3, admin_level_hint, QUERY_TIMEOUT_SECS);
            info!(url = %self.url, country = country_iso3, admin_level = admin_level_hint, "querying overpass");

            let body = retry(&self.policy, &self.cancel, SyncError::is_retryable, || {
                self.post_query(&query)
            })
            .await?;
            let elements = parse_elements(&body)?;
            info!(country = country_iso3, count = elements.len(), "fetched overpass elements");
            Ok(elements)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_targets_country_and_level() {
        let q = build_query("kor", 6, 60);
        assert!(q.starts_with("[out:json][timeout:60];"));
        assert!(q.contains(r#"area["ISO3166-1:alpha3"="KOR"]"#));
        assert!(q.contains(r#"["admin_level"="6"](area.country)"#));
        assert!(q.ends_with("out tags center;"));
    }

    #[test]
    fn parses_elements_with_and_without_center() {
        let body = r#"{"version":0.6,"elements":[
            {"type":"relation","id":1,"center":{"lat":37.5,"lon":127.0},"tags":{"name":"서울"}},
            {"type":"relation","id":2,"tags":{"name":"nowhere"}}
        ]}"#;
        let elements = parse_elements(body).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(elements[0].center.is_some());
        assert!(elements[1].center.is_none());
        assert_eq!(elements[0].name(), Some("서울"));
    }

    #[test]
    fn empty_response() {
        assert!(parse_elements(r#"{"elements":[]}"#).unwrap().is_empty());
        assert!(parse_elements("{}").unwrap().is_empty());
        assert!(parse_elements("<html>").is_err());
    }
}
