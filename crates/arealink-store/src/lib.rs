//! Storage layer: the `AreaStore` trait, an in-memory store, and a DuckDB
//! store behind the `duckdb` feature.

mod error;
pub use error::StoreError;

mod memory;
mod record;
pub use memory::MemoryStore;
pub use record::AreaRecord;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use arealink_core::{AdminLevel, EnrichmentCandidate, EnrichmentStatus, RegionTree};
use async_trait::async_trait;

/// Persistent home of ingested regions and their enrichment state.
///
/// Enrichment reads a batch, then writes each item; there is no transaction
/// spanning a batch. Concurrent runs against the same country must be
/// serialized by the caller.
#[async_trait]
pub trait AreaStore: Send + Sync {
    /// Distinct country codes, sorted.
    async fn list_countries(&self) -> Result<Vec<String>, StoreError>;

    /// Insert or update every region of the tree. Returns rows written.
    ///
    /// Existing English/local names are kept when the tree carries none.
    async fn upsert_tree(&self, tree: &RegionTree) -> Result<usize, StoreError>;

    /// Regions lacking an English or local name, in ingestion order.
    async fn fetch_regions_missing_names(
        &self,
        country: &str,
        level: Option<AdminLevel>,
    ) -> Result<Vec<AreaRecord>, StoreError>;

    /// Write an accepted candidate's names and its status.
    ///
    /// Fails with [`StoreError::RegionNotFound`] for an unknown id.
    async fn commit_enrichment(
        &self,
        region_id: &str,
        candidate: &EnrichmentCandidate,
        status: EnrichmentStatus,
    ) -> Result<(), StoreError>;

    async fn get_area(&self, region_id: &str) -> Result<Option<AreaRecord>, StoreError>;
}
