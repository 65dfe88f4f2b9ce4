//! AI layer: LLM name inference and the enrichment orchestrator that
//! gates its answers by confidence before committing them.

pub mod inference;
pub mod orchestrator;

pub use inference::{InferenceError, NameInference, NameQuery};
pub use orchestrator::{EnrichError, EnrichmentOrchestrator, EnrichmentRequest};

#[cfg(feature = "http")]
pub use inference::HttpInference;
