//! Error types for proxima.

use thiserror::Error;

/// Errors that can occur during ingestion, lifecycle and query operations.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// `predict` was called before any successful `fit` (the dataset store is empty).
    #[error("index is not fitted: the dataset store is empty")]
    NotFitted,

    /// A vector's length does not match the configured dimension.
    #[error("shape mismatch: expected dimension {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Storage operation failed (SQLite, filesystem, state encoding).
    ///
    /// Never retried: a partial chunk retry would break id alignment.
    #[error("backend I/O failure: {0}")]
    BackendIo(String),

    /// Invalid parameter value.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The dataset store and the index backend no longer agree on ids.
    ///
    /// Only `reset` (or a new `fit`) recovers from this state.
    #[error(
        "dataset store holds {dataset} records but the index backend holds {backend}; reset required"
    )]
    Desynchronized { dataset: usize, backend: usize },

    /// A previous `reset` destroyed the backend and failed to create its replacement.
    #[error("index backend unavailable after a failed reset")]
    BackendUnavailable,
}

impl From<std::io::Error> for RetrieveError {
    fn from(e: std::io::Error) -> Self {
        Self::BackendIo(format!("io error: {e}"))
    }
}

impl From<postcard::Error> for RetrieveError {
    fn from(e: postcard::Error) -> Self {
        Self::BackendIo(format!("postcard error: {e}"))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for RetrieveError {
    fn from(e: rusqlite::Error) -> Self {
        Self::BackendIo(format!("sqlite error: {e}"))
    }
}

/// Result type for proxima operations.
pub type Result<T> = std::result::Result<T, RetrieveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_surface_as_backend_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: RetrieveError = io.into();
        assert!(matches!(err, RetrieveError::BackendIo(ref msg) if msg.contains("read-only")));
    }

    #[test]
    fn shape_mismatch_message_names_both_dimensions() {
        let err = RetrieveError::ShapeMismatch {
            expected: 10,
            actual: 3,
        };
        assert_eq!(err.to_string(), "shape mismatch: expected dimension 10, got 3");
    }
}
