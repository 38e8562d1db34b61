//! Cooperative cancellation.

use crate::error::{SyncError, SyncResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation request shared between a run and its controllers.
///
/// A request is consumed by the first checkpoint that observes it. A
/// request made while no run is active stays pending until the next run
/// reaches a checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    requested: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a flag with no pending request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns true if a request is pending, without consuming it.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Consumes a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] naming `when` if a request was pending.
    pub fn checkpoint(&self, when: &str) -> SyncResult<()> {
        if self.requested.swap(false, Ordering::SeqCst) {
            return Err(SyncError::cancelled(when));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_consumes_request() {
        let flag = CancellationFlag::new();
        assert!(flag.checkpoint("first").is_ok());

        flag.cancel();
        assert!(flag.is_requested());
        let err = flag.checkpoint("before users").unwrap_err();
        assert!(matches!(err, SyncError::Cancelled { ref when } if when == "before users"));

        assert!(!flag.is_requested());
        assert!(flag.checkpoint("after").is_ok());
    }

    #[test]
    fn repeated_requests_collapse() {
        let flag = CancellationFlag::new();
        flag.cancel();
        flag.cancel();
        assert!(flag.checkpoint("a").is_err());
        assert!(flag.checkpoint("b").is_ok());
    }

    #[test]
    fn clones_share_state() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(flag.checkpoint("x").is_err());
    }
}
