//! Error types for store operations.

use chartsync_model::Domain;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A batch operation violated a store constraint.
    #[error("conflict in {domain} on key {key}: {reason}")]
    Conflict {
        /// Domain of the offending record.
        domain: Domain,
        /// Key of the offending record.
        key: String,
        /// What was violated.
        reason: String,
    },

    /// A record was written to a domain it does not belong to.
    #[error("record for {actual} passed to {expected}")]
    DomainMismatch {
        /// Domain named by the call.
        expected: Domain,
        /// Domain of the record.
        actual: Domain,
    },

    /// No open savepoint has the given name.
    #[error("no such savepoint: {0}")]
    NoSuchSavepoint(String),

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Creates a conflict error.
    pub fn conflict(domain: Domain, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            domain,
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error came from applying operations, as opposed
    /// to transaction bookkeeping or I/O.
    pub fn is_apply_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::DomainMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_conflicts_are_classified() {
        assert!(StoreError::conflict(Domain::Patients, "p1", "missing").is_apply_conflict());
        assert!(StoreError::DomainMismatch {
            expected: Domain::Users,
            actual: Domain::Forms
        }
        .is_apply_conflict());
        assert!(!StoreError::NoSuchSavepoint("x".into()).is_apply_conflict());
        assert!(!StoreError::Locked.is_apply_conflict());
    }

    #[test]
    fn error_display() {
        let err = StoreError::conflict(Domain::Patients, "p1", "update of missing record");
        assert_eq!(
            err.to_string(),
            "conflict in patients on key p1: update of missing record"
        );
    }
}
