//! Shared name-enrichment types, passed between the inference client, the
//! orchestrator and the store.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A proposed pair of names for one region, as returned by name inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentCandidate {
    pub region_id: String,
    /// Latin-script English name.
    pub name_en: String,
    /// Name in the country's own language and script.
    pub name_local: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Outcome for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// High confidence, committed without further checks.
    Applied,
    /// Medium confidence that passed name validation; committed.
    Validated,
    /// Low confidence or failed validation; never committed.
    Skipped,
    /// Inference or commit failed for this item.
    Error,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Validated => "validated",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }

    pub fn is_committable(&self) -> bool {
        matches!(self, Self::Applied | Self::Validated)
    }
}

#[derive(Debug, Error)]
#[error("unknown enrichment status: {0:?}")]
pub struct ParseStatusError(String);

impl FromStr for EnrichmentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applied" => Ok(Self::Applied),
            "validated" => Ok(Self::Validated),
            "skipped" => Ok(Self::Skipped),
            "error" => Ok(Self::Error),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Orchestrator progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running {
        country_index: usize,
        batch_index: usize,
    },
    Completed,
    PartiallyFailed,
}

/// Counters for one country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryResult {
    pub country_code: String,
    /// Regions fetched for enrichment.
    pub total: usize,
    /// Items that ended `Applied` or `Validated`.
    pub succeeded: usize,
    /// Items that ended `Error`.
    pub failed: usize,
    pub applied: usize,
    pub validated: usize,
    pub skipped: usize,
    /// Items actually written to the store; always 0 in dry-run mode.
    pub committed: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Set when the country's regions could not be fetched.
    pub error: Option<String>,
    pub elapsed_secs: f64,
}

impl CountryResult {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    /// Count one item's final status.
    pub fn record(&mut self, status: EnrichmentStatus) {
        match status {
            EnrichmentStatus::Applied => {
                self.applied += 1;
                self.succeeded += 1;
            }
            EnrichmentStatus::Validated => {
                self.validated += 1;
                self.succeeded += 1;
            }
            EnrichmentStatus::Skipped => self.skipped += 1,
            EnrichmentStatus::Error => self.failed += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.failed_batches > 0 || self.error.is_some()
    }

    fn add_to(&self, totals: &mut RunTotals) {
        totals.total += self.total;
        totals.succeeded += self.succeeded;
        totals.failed += self.failed;
        totals.applied += self.applied;
        totals.validated += self.validated;
        totals.skipped += self.skipped;
        totals.committed += self.committed;
        totals.batches += self.batches;
        totals.failed_batches += self.failed_batches;
    }
}

/// Counters summed over every country of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub countries: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub applied: usize,
    pub validated: usize,
    pub skipped: usize,
    pub committed: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Final report of one enrichment run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRunResult {
    countries: Vec<CountryResult>,
    totals: RunTotals,
    state: RunState,
    dry_run: bool,
    elapsed_secs: f64,
    completed_at: DateTime<Utc>,
}

impl BatchRunResult {
    pub fn new(countries: Vec<CountryResult>, state: RunState, dry_run: bool, elapsed_secs: f64) -> Self {
        let mut totals = RunTotals {
            countries: countries.len(),
            ..RunTotals::default()
        };
        for c in &countries {
            c.add_to(&mut totals);
        }
        Self {
            countries,
            totals,
            state,
            dry_run,
            elapsed_secs,
            completed_at: Utc::now(),
        }
    }

    pub fn countries(&self) -> &[CountryResult] {
        &self.countries
    }

    pub fn country(&self, code: &str) -> Option<&CountryResult> {
        self.countries.iter().find(|c| c.country_code == code)
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}
