//! Pipeline configuration as read from a JSON file. The runner overlays
//! `AREALINK_*` environment variables on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::region::AdminLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Backoff knobs, converted into a retry policy by the sync crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// ISO 3166-1 alpha-3 codes. Empty means every country in the store.
    pub countries: Vec<String>,
    pub batch_size: usize,
    pub dry_run: bool,
    /// Restrict enrichment to one level.
    pub level: Option<AdminLevel>,
    /// Resolve Overpass elements against ADM2 regions during ingestion.
    pub match_points: bool,
    pub boundary_url: String,
    pub overpass_url: String,
    pub inference_url: String,
    pub inference_model: Option<String>,
    /// DuckDB file; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub retry: RetrySettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            countries: Vec::new(),
            batch_size: 10,
            dry_run: false,
            level: None,
            match_points: false,
            boundary_url: "https://www.geoboundaries.org/api/current/gbOpen".into(),
            overpass_url: "https://overpass-api.de/api/interpreter".into(),
            inference_url: "http://localhost:8080".into(),
            inference_model: None,
            database_path: None,
            retry: RetrySettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1.0".into()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        if let Some(bad) = self
            .countries
            .iter()
            .find(|c| c.len() != 3 || !c.bytes().all(|b| b.is_ascii_alphabetic()))
        {
            return Err(ConfigError::InvalidValue {
                key: "countries".into(),
                value: bad.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 10);
        assert!(!config.dry_run);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 500);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"countries":["KOR"],"level":"ADM2","retry":{"max_retries":5}}"#)
                .unwrap();
        assert_eq!(config.countries, vec!["KOR"]);
        assert_eq!(config.level, Some(AdminLevel::Adm2));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn rejects_malformed_country_codes() {
        assert!(PipelineConfig::from_json_str(r#"{"countries":["KR"]}"#).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"dry_run":true}"#).unwrap();
        assert!(PipelineConfig::load(&path).unwrap().dry_run);
        assert!(matches!(
            PipelineConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
