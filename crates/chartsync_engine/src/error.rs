//! Error types for the sync engine.

use chartsync_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote was confirmed unreachable before the run started.
    #[error("remote server is unavailable")]
    Unavailable,

    /// Cancellation was observed at a checkpoint.
    #[error("sync cancelled {when}")]
    Cancelled {
        /// The checkpoint that observed the request.
        when: String,
    },

    /// A remote fetch did not complete within its bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The fetch that timed out.
        operation: String,
        /// The bound that elapsed.
        after: Duration,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Malformed remote response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server reported an error.
    #[error("server error: {0}")]
    ServerError(String),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// How a failed run is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The run was cancelled.
    Canceled,
    /// Applying changes to the local store failed.
    Database,
    /// Any other failure: network, timeout, malformed data.
    Io,
}

impl SyncError {
    /// Creates a cancellation error for a checkpoint.
    pub fn cancelled(when: impl Into<String>) -> Self {
        Self::Cancelled { when: when.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if running the sync again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout { .. } => true,
            SyncError::ServerError(_) => true,
            SyncError::Unavailable => true,
            _ => false,
        }
    }

    /// Classifies the error for status reporting and error stats.
    pub fn classify(&self) -> FailureKind {
        match self {
            SyncError::Cancelled { .. } => FailureKind::Canceled,
            SyncError::Store(e) if e.is_apply_conflict() => FailureKind::Database,
            _ => FailureKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartsync_model::Domain;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(SyncError::timeout("encounters", Duration::from_secs(1)).is_retryable());
        assert!(SyncError::ServerError("internal error".into()).is_retryable());
        assert!(!SyncError::cancelled("before users").is_retryable());
        assert!(!SyncError::Protocol("bad json".into()).is_retryable());
    }

    #[test]
    fn classification() {
        assert_eq!(
            SyncError::cancelled("before users").classify(),
            FailureKind::Canceled
        );
        let conflict = StoreError::conflict(Domain::Patients, "p1", "update of missing record");
        assert_eq!(SyncError::from(conflict).classify(), FailureKind::Database);
        assert_eq!(
            SyncError::from(StoreError::NoSuchSavepoint("s".into())).classify(),
            FailureKind::Io
        );
        assert_eq!(
            SyncError::timeout("users", Duration::from_secs(5)).classify(),
            FailureKind::Io
        );
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::cancelled("before patients").to_string(),
            "sync cancelled before patients"
        );
        assert_eq!(
            SyncError::Unavailable.to_string(),
            "remote server is unavailable"
        );
    }
}
