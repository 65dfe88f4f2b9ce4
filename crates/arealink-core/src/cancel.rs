use thiserror::Error;

/// A run was cancelled before the operation could finish.
///
/// Every error type that crosses a retry boundary converts from this, so
/// cancellation surfaces through the ordinary error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;
