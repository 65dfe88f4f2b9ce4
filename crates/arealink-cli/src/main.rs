mod pipeline;
mod settings;

use std::sync::Arc;

use anyhow::Context;
use arealink_ai::{EnrichmentOrchestrator, EnrichmentRequest, HttpInference};
use arealink_store::{AreaStore, DuckStore, MemoryStore};
use arealink_sync::{GeoBoundariesClient, OverpassClient, PointSource, RetryPolicy};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("arealink v{}", env!("CARGO_PKG_VERSION"));

    let config = settings::Overrides::parse().resolve()?;
    let policy = RetryPolicy::from(&config.retry);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let store: Arc<dyn AreaStore> = match &config.database_path {
        Some(path) => Arc::new(
            DuckStore::open_persistent(path)
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    // 1. Ingest configured countries.
    let boundaries =
        GeoBoundariesClient::new(config.boundary_url.clone(), policy.clone(), cancel.clone());
    let overpass = config
        .match_points
        .then(|| OverpassClient::new(config.overpass_url.clone(), policy.clone(), cancel.clone()));
    let mut ingested = 0;
    for country in &config.countries {
        if cancel.is_cancelled() {
            break;
        }
        let sources = pipeline::Sources {
            boundaries: &boundaries,
            points: overpass.as_ref().map(|o| o as &dyn PointSource),
            store: store.as_ref(),
        };
        match pipeline::ingest_country(&sources, &policy, &cancel, country).await {
            Ok(_) => ingested += 1,
            Err(e) => warn!(country = %country, error = %format!("{e:#}"), "ingestion failed"),
        }
    }
    if ingested == 0 && !config.countries.is_empty() && !cancel.is_cancelled() {
        anyhow::bail!("no boundary data could be ingested for any configured country");
    }

    // 2. Enrich names.
    let inference = Arc::new(HttpInference::new(
        config.inference_url.clone(),
        config.inference_model.clone(),
    ));
    let orchestrator = EnrichmentOrchestrator::new(store, inference)
        .with_retry_policy(policy)
        .with_cancellation(cancel);
    let result = orchestrator
        .run(&EnrichmentRequest::from(&config))
        .await
        .context("enrichment run")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
