//! Configuration for the sync engine.

use std::time::Duration;

/// Chart layout synchronized when no other chart is configured.
pub const DEFAULT_CHART_UUID: &str = "ea43f213-66fb-4af6-8a49-70fd6b9ce5d4";

/// Savepoint wrapping every run.
pub const DEFAULT_SAVEPOINT: &str = "SYNC_SAVEPOINT";

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Chart layout fetched by the chart phase.
    pub chart_uuid: String,
    /// Name of the savepoint opened for each run.
    pub savepoint_name: String,
    /// Upper bounds for remote fetches.
    pub timeouts: FetchTimeouts,
    /// Locale used when loading concept names.
    pub locale: String,
}

impl SyncConfig {
    /// Creates a configuration for the given chart.
    pub fn new(chart_uuid: impl Into<String>) -> Self {
        Self {
            chart_uuid: chart_uuid.into(),
            savepoint_name: DEFAULT_SAVEPOINT.to_string(),
            timeouts: FetchTimeouts::default(),
            locale: "en".to_string(),
        }
    }

    /// Sets the savepoint name.
    pub fn with_savepoint_name(mut self, name: impl Into<String>) -> Self {
        self.savepoint_name = name.into();
        self
    }

    /// Sets the fetch timeouts.
    pub fn with_timeouts(mut self, timeouts: FetchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets the concept name locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_UUID)
    }
}

/// Upper bounds for remote fetches.
///
/// Encounters are the largest payload and get their own bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    /// Bound for every fetch except encounters.
    pub default: Duration,
    /// Bound for encounter fetches.
    pub observations: Duration,
}

impl FetchTimeouts {
    /// Creates timeouts with explicit bounds.
    pub fn new(default: Duration, observations: Duration) -> Self {
        Self {
            default,
            observations,
        }
    }
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(60),
            observations: Duration::from_secs(180),
        }
    }
}
