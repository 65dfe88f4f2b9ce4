//! Ingestion pipeline: fetch → map → link → (match) → upsert, per country.

use anyhow::Context;
use arealink_core::linker;
use arealink_core::matcher::resolve_matches;
use arealink_core::{AdminLevel, BoundaryMapper, FeatureCollection, Region, RegionTree};
use arealink_store::{AreaStore, StoreError};
use arealink_sync::{BoundarySource, PointSource, RetryPolicy, retry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct IngestStats {
    pub adm1: usize,
    pub adm2: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub dropped: usize,
    pub matched: usize,
    pub upserted: usize,
}

/// Map the three levels and link ADM2 regions under ADM1 regions.
///
/// Returns the assembled tree and how many features were dropped.
pub fn build_tree(
    country: &str,
    adm0: Option<&FeatureCollection>,
    adm1: &FeatureCollection,
    adm2: &FeatureCollection,
) -> (RegionTree, usize) {
    let mapper = BoundaryMapper::new(country);
    let mut dropped = 0;

    let root: Option<Region> = adm0.and_then(|fc| {
        let outcome = mapper.map_adm0(fc);
        dropped += outcome.dropped.len();
        outcome.regions.into_iter().next()
    });
    let provinces = mapper.map_adm1(adm1);
    let districts = mapper.map_adm2(adm2);
    dropped += provinces.dropped.len() + districts.dropped.len();

    let links = linker::link(&provinces.regions, &districts.regions);
    let tree = RegionTree::assemble(country, root, provinces.regions, districts.regions, &links);
    (tree, dropped)
}

/// Where ingestion reads from and writes to.
pub struct Sources<'a> {
    pub boundaries: &'a dyn BoundarySource,
    pub points: Option<&'a dyn PointSource>,
    pub store: &'a dyn AreaStore,
}

pub async fn ingest_country(
    sources: &Sources<'_>,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    country: &str,
) -> anyhow::Result<IngestStats> {
    let Sources {
        boundaries,
        points,
        store,
    } = *sources;
    let (adm0, adm1, adm2) = futures::join!(
        boundaries.fetch_level(country, AdminLevel::Adm0),
        boundaries.fetch_level(country, AdminLevel::Adm1),
        boundaries.fetch_level(country, AdminLevel::Adm2),
    );
    let adm0 = adm0
        .inspect_err(|e| warn!(country, error = %e, "no country outline, continuing without root"))
        .ok();
    let adm1 = adm1.with_context(|| format!("fetching {country} ADM1"))?;
    let adm2 = adm2.with_context(|| format!("fetching {country} ADM2"))?;

    let (mut tree, dropped) = build_tree(country, adm0.as_ref(), &adm1, &adm2);
    let tree_stats = tree.stats();

    let mut matched = 0;
    if let Some(points) = points {
        match points
            .fetch_elements(country, AdminLevel::Adm2.osm_admin_level())
            .await
        {
            Ok(elements) => {
                let set = resolve_matches(tree.at_level(AdminLevel::Adm2), &elements);
                matched = set.apply(&mut tree);
            }
            Err(e) => warn!(country, error = %e, "point matching skipped"),
        }
    }

    let upserted = retry(policy, cancel, StoreError::is_retryable, || store.upsert_tree(&tree))
        .await
        .with_context(|| format!("storing {country} regions"))?;

    let stats = IngestStats {
        adm1: tree_stats.adm1,
        adm2: tree_stats.adm2,
        linked: tree_stats.linked,
        unlinked: tree_stats.unlinked,
        dropped,
        matched,
        upserted,
    };
    info!(
        country,
        adm1 = stats.adm1,
        adm2 = stats.adm2,
        linked = stats.linked,
        unlinked = stats.unlinked,
        dropped = stats.dropped,
        matched = stats.matched,
        "ingested country"
    );
    Ok(stats)
}
