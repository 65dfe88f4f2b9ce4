use thiserror::Error;

use crate::retry::Cancelled;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no GeoJSON download URL for {country} {level}")]
    MissingDownloadUrl { country: String, level: String },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl SyncError {
    /// Transport failures, rate limiting and 5xx responses are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Server { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::MissingDownloadUrl { .. } | Self::Cancelled(_) => false,
        }
    }
}
