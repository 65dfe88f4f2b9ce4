//! Source clients: geoBoundaries polygons, Overpass point elements, and
//! the retry/backoff primitive they share with the enrichment run.

pub mod boundary;
mod error;
pub mod overpass;
pub mod retry;

pub use boundary::BoundarySource;
pub use error::SyncError;
pub use overpass::PointSource;
pub use retry::{Cancelled, RetryPolicy, retry};

#[cfg(feature = "http")]
pub use boundary::GeoBoundariesClient;
#[cfg(feature = "http")]
pub use overpass::OverpassClient;
