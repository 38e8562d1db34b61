//! Sync phases and run requests.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One unit of sync work, covering one data domain.
///
/// The declaration order is the execution order. Later phases depend on
/// earlier ones: observations need patients, the chart needs concepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncPhase {
    /// Users (providers).
    Users,
    /// Locations.
    Locations,
    /// Chart layout.
    ChartItems,
    /// Concepts and their localized names.
    Concepts,
    /// Patients.
    Patients,
    /// Encounter observations.
    Observations,
    /// Orders.
    Orders,
    /// Form definitions.
    Forms,
}

impl SyncPhase {
    /// Every phase in execution order.
    pub const ALL: [SyncPhase; 8] = [
        SyncPhase::Users,
        SyncPhase::Locations,
        SyncPhase::ChartItems,
        SyncPhase::Concepts,
        SyncPhase::Patients,
        SyncPhase::Observations,
        SyncPhase::Orders,
        SyncPhase::Forms,
    ];

    /// Returns the short name used in logs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Users => "users",
            SyncPhase::Locations => "locations",
            SyncPhase::ChartItems => "chart_items",
            SyncPhase::Concepts => "concepts",
            SyncPhase::Patients => "patients",
            SyncPhase::Observations => "observations",
            SyncPhase::Orders => "orders",
            SyncPhase::Forms => "forms",
        }
    }

    /// Returns the progress label shown while the phase runs.
    pub fn label(&self) -> &'static str {
        match self {
            SyncPhase::Users => "syncing users",
            SyncPhase::Locations => "syncing locations",
            SyncPhase::ChartItems => "syncing charts",
            SyncPhase::Concepts => "syncing concepts",
            SyncPhase::Patients => "syncing patients",
            SyncPhase::Observations => "syncing observations",
            SyncPhase::Orders => "syncing orders",
            SyncPhase::Forms => "syncing forms",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sync phase: {s}"))
    }
}

/// What a single run should do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequest {
    /// Explicitly requested phases. Empty means every phase.
    pub phases: BTreeSet<SyncPhase>,
    /// Run every phase regardless of `phases`.
    pub full_sync: bool,
    /// Fetch only observations newer than the stored watermark.
    pub incremental_observations: bool,
    /// Persist start and end timestamps of this run.
    pub record_full_sync_window: bool,
}

impl SyncRequest {
    /// Creates a request for every phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a full sync request that also records the sync window.
    pub fn full() -> Self {
        Self {
            full_sync: true,
            record_full_sync_window: true,
            ..Self::default()
        }
    }

    /// Creates a request for the given phases.
    pub fn phases(phases: impl IntoIterator<Item = SyncPhase>) -> Self {
        Self {
            phases: phases.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Adds a phase to the selection.
    pub fn with_phase(mut self, phase: SyncPhase) -> Self {
        self.phases.insert(phase);
        self
    }

    /// Requests incremental observation fetching.
    pub fn with_incremental_observations(mut self) -> Self {
        self.incremental_observations = true;
        self
    }

    /// Requests recording of the full-sync window.
    pub fn with_full_sync_window(mut self) -> Self {
        self.record_full_sync_window = true;
        self
    }

    /// Returns the phases to execute, in execution order.
    pub fn selected_phases(&self) -> Vec<SyncPhase> {
        if self.full_sync || self.phases.is_empty() {
            return SyncPhase::ALL.to_vec();
        }
        SyncPhase::ALL
            .into_iter()
            .filter(|phase| self.phases.contains(phase))
            .collect()
    }
}
