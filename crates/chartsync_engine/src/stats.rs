//! Run outcomes and per-domain counters.

use crate::error::SyncError;
use crate::phase::SyncPhase;
use std::collections::BTreeMap;
use std::time::Duration;

/// Changes applied to one domain during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainCounts {
    /// Records inserted.
    pub inserted: u64,
    /// Records replaced with newer content.
    pub updated: u64,
    /// Records removed.
    pub deleted: u64,
    /// Degenerate remote entries that were skipped, and phase failures.
    pub errors: u64,
}

impl DomainCounts {
    /// Returns the number of records changed.
    pub fn changes(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Counts per executed phase.
    pub domains: BTreeMap<SyncPhase, DomainCounts>,
    /// Local store failures.
    pub database_errors: u64,
    /// Network, timeout and malformed-data failures.
    pub io_errors: u64,
}

impl SyncStats {
    /// Returns the counts recorded for a phase.
    pub fn counts(&self, phase: SyncPhase) -> DomainCounts {
        self.domains.get(&phase).copied().unwrap_or_default()
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every selected phase committed.
    Succeeded,
    /// The run failed; nothing was committed.
    Failed,
    /// The run was cancelled; nothing was committed.
    Canceled,
}

/// Result of one run.
#[derive(Debug)]
pub struct SyncRunResult {
    /// Terminal outcome.
    pub outcome: SyncOutcome,
    /// Phases that were started, in order.
    pub phases_run: Vec<SyncPhase>,
    /// Counters.
    pub stats: SyncStats,
    /// Failure or cancellation cause.
    pub cause: Option<SyncError>,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncRunResult {
    /// Returns true if the run committed.
    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Succeeded
    }
}
