//! Remote reachability, as last probed.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether the remote is known to be unreachable.
///
/// Consulted once at the start of each run.
pub trait HealthMonitor: Send + Sync {
    /// Returns true only when a probe has confirmed the remote is down.
    fn is_remote_definitely_unavailable(&self) -> bool;
}

/// Never reports the remote as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAvailable;

impl HealthMonitor for AssumeAvailable {
    fn is_remote_definitely_unavailable(&self) -> bool {
        false
    }
}

/// Health updated by an external probe.
#[derive(Debug, Default)]
pub struct HealthState {
    unavailable: AtomicBool,
}

impl HealthState {
    /// Creates a state reporting the remote as available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed probe.
    pub fn mark_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    /// Records a successful probe.
    pub fn mark_available(&self) {
        self.unavailable.store(false, Ordering::SeqCst);
    }
}

impl HealthMonitor for HealthState {
    fn is_remote_definitely_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }
}
