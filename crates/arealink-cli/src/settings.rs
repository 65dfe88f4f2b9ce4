//! Runner settings: the JSON config file named by `AREALINK_CONFIG`, with
//! `AREALINK_*` environment variables (or the matching long flags) on top.

use std::path::PathBuf;

use anyhow::Context;
use arealink_core::{AdminLevel, PipelineConfig};
use clap::Parser;
use clap::builder::BoolishValueParser;

#[derive(Debug, Parser)]
#[command(name = "arealink")]
#[command(about = "Ingest admin boundaries, link the hierarchy and enrich region names", long_about = None)]
#[command(version)]
pub struct Overrides {
    /// JSON config file; every other setting overrides a value from it
    #[arg(long, env = "AREALINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated ISO 3166-1 alpha-3 codes
    #[arg(long, env = "AREALINK_COUNTRIES", value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    #[arg(long, env = "AREALINK_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    #[arg(long, env = "AREALINK_DRY_RUN", value_parser = BoolishValueParser::new())]
    pub dry_run: Option<bool>,

    /// Only enrich regions at this level (ADM0, ADM1 or ADM2)
    #[arg(long, env = "AREALINK_LEVEL")]
    pub level: Option<AdminLevel>,

    #[arg(long, env = "AREALINK_MATCH_POINTS", value_parser = BoolishValueParser::new())]
    pub match_points: Option<bool>,

    #[arg(long, env = "AREALINK_BOUNDARY_URL")]
    pub boundary_url: Option<String>,

    #[arg(long, env = "AREALINK_OVERPASS_URL")]
    pub overpass_url: Option<String>,

    #[arg(long, env = "AREALINK_INFERENCE_URL")]
    pub inference_url: Option<String>,

    #[arg(long, env = "AREALINK_INFERENCE_MODEL")]
    pub inference_model: Option<String>,

    /// DuckDB file; without one the run keeps areas in memory
    #[arg(long, env = "AREALINK_DATABASE")]
    pub database: Option<PathBuf>,

    #[arg(long, env = "AREALINK_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    #[arg(long, env = "AREALINK_RETRY_INITIAL_MS")]
    pub retry_initial_ms: Option<u64>,

    #[arg(long, env = "AREALINK_RETRY_MAX_MS")]
    pub retry_max_ms: Option<u64>,

    #[arg(long, env = "AREALINK_RETRY_JITTER", value_parser = BoolishValueParser::new())]
    pub retry_jitter: Option<bool>,
}

impl Overrides {
    /// Read the config file (or defaults) and apply every override set.
    pub fn resolve(self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        self.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply(self, config: &mut PipelineConfig) {
        if let Some(countries) = self.countries {
            config.countries = countries
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
        set(&mut config.batch_size, self.batch_size);
        set(&mut config.dry_run, self.dry_run);
        if self.level.is_some() {
            config.level = self.level;
        }
        set(&mut config.match_points, self.match_points);
        set(&mut config.boundary_url, self.boundary_url);
        set(&mut config.overpass_url, self.overpass_url);
        set(&mut config.inference_url, self.inference_url);
        if let Some(model) = self.inference_model.filter(|m| !m.is_empty()) {
            config.inference_model = Some(model);
        }
        if let Some(path) = self.database {
            config.database_path = Some(path);
        }
        set(&mut config.retry.max_retries, self.max_retries);
        set(&mut config.retry.initial_delay_ms, self.retry_initial_ms);
        set(&mut config.retry.max_delay_ms, self.retry_max_ms);
        set(&mut config.retry.jitter, self.retry_jitter);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
