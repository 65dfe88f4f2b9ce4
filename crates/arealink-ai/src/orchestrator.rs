//! Enrichment orchestrator: walks countries and batches of unnamed regions,
//! asks for name candidates, gates each by confidence and commits the
//! accepted ones.
//!
//! Failures are contained at the smallest unit: a failed inference call
//! fails its batch, a missing candidate or failed commit fails its item,
//! and an unreadable country fails only that country. Only an empty
//! country list or a zero batch size aborts the run.
//!
//! Runs against the same country must not overlap; the store offers no
//! cross-batch transaction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arealink_core::policy;
use arealink_core::{
    AdminLevel, BatchRunResult, CountryResult, EnrichmentCandidate, EnrichmentStatus,
    PipelineConfig, RunState,
};
use arealink_store::{AreaRecord, AreaStore, StoreError};
use arealink_sync::{Cancelled, RetryPolicy, retry};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::inference::{InferenceError, NameInference, NameQuery};

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("no countries to enrich")]
    NoCountries,
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("failed to list countries: {0}")]
    ListCountries(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRequest {
    /// Country codes to process, in order. Empty means every stored country.
    pub countries: Vec<String>,
    pub batch_size: usize,
    /// Evaluate everything but commit nothing.
    pub dry_run: bool,
    pub level: Option<AdminLevel>,
}

impl Default for EnrichmentRequest {
    fn default() -> Self {
        Self {
            countries: Vec::new(),
            batch_size: 10,
            dry_run: false,
            level: None,
        }
    }
}

impl From<&PipelineConfig> for EnrichmentRequest {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            countries: config.countries.clone(),
            batch_size: config.batch_size,
            dry_run: config.dry_run,
            level: config.level,
        }
    }
}

pub struct EnrichmentOrchestrator {
    store: Arc<dyn AreaStore>,
    inference: Arc<dyn NameInference>,
    retry_policy: RetryPolicy,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
}

/// Whether a country ran to the end or was cut short by cancellation.
enum CountryOutcome {
    Finished(CountryResult),
    Cancelled(CountryResult),
}

impl EnrichmentOrchestrator {
    pub fn new(store: Arc<dyn AreaStore>, inference: Arc<dyn NameInference>) -> Self {
        let (state, _) = watch::channel(RunState::NotStarted);
        Self {
            store,
            inference,
            retry_policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, request: &EnrichmentRequest) -> Result<BatchRunResult, EnrichError> {
        if request.batch_size == 0 {
            return Err(EnrichError::ZeroBatchSize);
        }
        let countries = if request.countries.is_empty() {
            retry(&self.retry_policy, &self.cancel, StoreError::is_retryable, || {
                self.store.list_countries()
            })
            .await?
        } else {
            request.countries.clone()
        };
        if countries.is_empty() {
            return Err(EnrichError::NoCountries);
        }

        let start = Instant::now();
        info!(
            countries = countries.len(),
            batch_size = request.batch_size,
            dry_run = request.dry_run,
            "starting enrichment run"
        );

        let mut results = Vec::with_capacity(countries.len());
        let mut cancelled = false;
        for (country_index, country) in countries.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            self.state.send_replace(RunState::Running {
                country_index,
                batch_index: 0,
            });
            match self.enrich_country(country_index, country, request).await {
                CountryOutcome::Finished(result) => results.push(result),
                CountryOutcome::Cancelled(result) => {
                    results.push(result);
                    cancelled = true;
                    break;
                }
            }
        }

        let state = if cancelled || results.iter().any(CountryResult::has_failures) {
            RunState::PartiallyFailed
        } else {
            RunState::Completed
        };
        self.state.send_replace(state);

        let result = BatchRunResult::new(results, state, request.dry_run, start.elapsed().as_secs_f64());
        let totals = result.totals();
        info!(
            state = ?state,
            countries = totals.countries,
            total = totals.total,
            applied = totals.applied,
            validated = totals.validated,
            skipped = totals.skipped,
            failed = totals.failed,
            committed = totals.committed,
            failed_batches = totals.failed_batches,
            cancelled,
            "enrichment run finished"
        );
        Ok(result)
    }

    async fn enrich_country(
        &self,
        country_index: usize,
        country: &str,
        request: &EnrichmentRequest,
    ) -> CountryOutcome {
        let start = Instant::now();
        let mut result = CountryResult::new(country);

        let records = match retry(
            &self.retry_policy,
            &self.cancel,
            StoreError::is_retryable,
            || self.store.fetch_regions_missing_names(country, request.level),
        )
        .await
        {
            Ok(records) => records,
            Err(StoreError::Cancelled(_)) => {
                warn!(country, "enrichment cancelled");
                result.elapsed_secs = start.elapsed().as_secs_f64();
                return CountryOutcome::Cancelled(result);
            }
            Err(e) => {
                warn!(country, error = %e, "failed to fetch regions, skipping country");
                result.error = Some(e.to_string());
                result.elapsed_secs = start.elapsed().as_secs_f64();
                return CountryOutcome::Finished(result);
            }
        };
        result.total = records.len();
        info!(country, regions = records.len(), "enriching country");

        let mut cancelled = false;
        for (batch_index, batch) in records.chunks(request.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            self.state.send_replace(RunState::Running {
                country_index,
                batch_index,
            });

            let queries: Vec<NameQuery> = batch.iter().map(NameQuery::from_record).collect();
            let candidates = match retry(
                &self.retry_policy,
                &self.cancel,
                InferenceError::is_retryable,
                || self.inference.infer_batch(&queries),
            )
            .await
            {
                Ok(candidates) => candidates,
                Err(InferenceError::Cancelled(_)) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        country,
                        batch = batch_index,
                        size = batch.len(),
                        error = %e,
                        "batch inference failed"
                    );
                    result.batches += 1;
                    result.failed_batches += 1;
                    result.failed += batch.len();
                    continue;
                }
            };
            result.batches += 1;

            let mut by_id: HashMap<&str, &EnrichmentCandidate> = HashMap::new();
            for c in &candidates {
                by_id.entry(c.region_id.as_str()).or_insert(c);
            }

            for record in batch {
                let candidate = by_id.get(record.id.as_str()).copied();
                match self
                    .settle(record, candidate, request.dry_run, &mut result)
                    .await
                {
                    Ok(status) => result.record(status),
                    Err(Cancelled) => {
                        cancelled = true;
                        break;
                    }
                }
            }
            if cancelled {
                break;
            }
            debug!(
                country,
                batch = batch_index,
                applied = result.applied,
                validated = result.validated,
                skipped = result.skipped,
                failed = result.failed,
                "batch done"
            );
        }

        result.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            country,
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed,
            committed = result.committed,
            elapsed_secs = result.elapsed_secs,
            "country done"
        );
        if cancelled {
            warn!(country, "enrichment cancelled");
            CountryOutcome::Cancelled(result)
        } else {
            CountryOutcome::Finished(result)
        }
    }

    /// Decide one item's final status, committing it when accepted.
    ///
    /// An item whose commit is cut short by cancellation is left unrecorded.
    async fn settle(
        &self,
        record: &AreaRecord,
        candidate: Option<&EnrichmentCandidate>,
        dry_run: bool,
        result: &mut CountryResult,
    ) -> Result<EnrichmentStatus, Cancelled> {
        let Some(candidate) = candidate else {
            debug!(region = %record.id, "no candidate returned");
            return Ok(EnrichmentStatus::Error);
        };

        let status = policy::evaluate(candidate);
        if !status.is_committable() || dry_run {
            return Ok(status);
        }

        let committed = retry(
            &self.retry_policy,
            &self.cancel,
            StoreError::is_retryable,
            || self.store.commit_enrichment(&record.id, candidate, status),
        )
        .await;
        match committed {
            Ok(()) => {
                result.committed += 1;
                Ok(status)
            }
            Err(StoreError::Cancelled(c)) => Err(c),
            Err(e) => {
                warn!(region = %record.id, error = %e, "commit failed");
                Ok(EnrichmentStatus::Error)
            }
        }
    }
}
