use arealink_core::Cancelled;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("region not found: {0}")]
    RegionNotFound(String),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("geometry encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Backend I/O and lock failures may clear on a later attempt; missing
    /// rows, undecodable data and cancellation never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "duckdb")]
            Self::DuckDb(e) => !matches!(
                e,
                ::duckdb::Error::QueryReturnedNoRows
                    | ::duckdb::Error::FromSqlConversionFailure(..)
                    | ::duckdb::Error::InvalidColumnType(..)
            ),
            Self::Other(_) => true,
            Self::RegionNotFound(_) | Self::Json(_) | Self::Cancelled(_) => false,
        }
    }
}
