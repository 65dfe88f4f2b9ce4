//! Core types for arealink: the planar geometry kernel, region hierarchy,
//! boundary mapping, parent linking and point matching, plus the shared
//! enrichment types and pipeline configuration.

pub mod cancel;
pub mod config;
pub mod enrichment;
pub mod feature;
pub mod geometry;
pub mod linker;
pub mod mapper;
pub mod matcher;
pub mod policy;
pub mod region;

#[cfg(test)]
mod testing;

pub use cancel::Cancelled;
pub use config::{ConfigError, PipelineConfig, RetrySettings};
pub use enrichment::{
    BatchRunResult, CountryResult, EnrichmentCandidate, EnrichmentStatus, ParseStatusError, RunState,
    RunTotals,
};
pub use feature::{Feature, FeatureCollection, Geometry};
pub use geometry::{BoundingBox, Coordinate, Polygon, Ring, RingPosition};
pub use linker::{BboxScan, CandidateIndex, GridIndex};
pub use mapper::{BoundaryMapper, Diagnostic, DropReason, MapOutcome, PropertyKeys};
pub use matcher::{MatchSet, PointElement};
pub use region::{AdminLevel, ExternalRefs, Region, RegionIdx, RegionTree, TreeStats};
