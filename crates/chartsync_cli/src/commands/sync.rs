//! Sync command implementation.

use crate::http::ReqwestClient;
use chartsync_engine::{
    FetchTimeouts, HealthState, HttpRemoteClient, SyncConfig, SyncEngine, SyncOutcome, SyncPhase,
    SyncRequest, SyncRunResult, SyncStatus,
};
use chartsync_store::FileStore;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Longest wait for the reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Options of the sync command.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Server base URL.
    pub server: String,
    /// Requested phases; empty means all.
    pub phases: Vec<SyncPhase>,
    /// Run every phase and record the window.
    pub full: bool,
    /// Fetch observations incrementally.
    pub incremental_observations: bool,
    /// Record the full-sync window.
    pub record_window: bool,
    /// Chart layout override.
    pub chart: Option<String>,
    /// Fetch timeout in seconds.
    pub timeout: u64,
    /// Encounter fetch timeout in seconds.
    pub observations_timeout: u64,
    /// Probe the server before syncing.
    pub probe: bool,
}

impl SyncOptions {
    /// Builds the engine request.
    pub fn request(&self) -> SyncRequest {
        let mut request = if self.full {
            SyncRequest::full()
        } else {
            SyncRequest::phases(self.phases.iter().copied())
        };
        request.incremental_observations = self.incremental_observations;
        request.record_full_sync_window |= self.record_window;
        request
    }

    /// Builds the engine configuration.
    pub fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::default().with_timeouts(FetchTimeouts::new(
            Duration::from_secs(self.timeout),
            Duration::from_secs(self.observations_timeout),
        ));
        if let Some(chart) = &self.chart {
            config.chart_uuid = chart.clone();
        }
        config
    }
}

/// Result of one sync run.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Terminal outcome.
    pub outcome: &'static str,
    /// Counts per executed phase.
    pub phases: Vec<PhaseReport>,
    /// Local store failures.
    pub database_errors: u64,
    /// Network and data failures.
    pub io_errors: u64,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
    /// Failure cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Counts of one phase.
#[derive(Debug, Serialize)]
pub struct PhaseReport {
    /// Phase name.
    pub phase: &'static str,
    /// Records inserted.
    pub inserted: u64,
    /// Records updated.
    pub updated: u64,
    /// Records deleted.
    pub deleted: u64,
    /// Entries skipped or failed.
    pub errors: u64,
}

impl From<&SyncRunResult> for SyncReport {
    fn from(result: &SyncRunResult) -> Self {
        let outcome = match result.outcome {
            SyncOutcome::Succeeded => "succeeded",
            SyncOutcome::Failed => "failed",
            SyncOutcome::Canceled => "canceled",
        };
        let phases = result
            .phases_run
            .iter()
            .map(|&phase| {
                let counts = result.stats.counts(phase);
                PhaseReport {
                    phase: phase.as_str(),
                    inserted: counts.inserted,
                    updated: counts.updated,
                    deleted: counts.deleted,
                    errors: counts.errors,
                }
            })
            .collect();
        Self {
            outcome,
            phases,
            database_errors: result.stats.database_errors,
            io_errors: result.stats.io_errors,
            duration_ms: result.duration.as_millis() as u64,
            cause: result.cause.as_ref().map(ToString::to_string),
        }
    }
}

/// Runs the sync command.
pub fn run(path: &Path, options: &SyncOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;
    let remote = HttpRemoteClient::new(options.server.clone(), ReqwestClient::new()?);

    let health = Arc::new(HealthState::new());
    if options.probe {
        remote.probe(&health, PROBE_TIMEOUT);
    }

    let engine = SyncEngine::new(options.config(), remote, store).with_health(health);
    engine.add_observer(Arc::new(|status: &SyncStatus| {
        if let SyncStatus::InProgress(progress) = status {
            info!(percent = progress.percent, "{}", progress.label);
        }
    }));

    let result = engine.run(&options.request());
    let report = SyncReport::from(&result);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    if result.is_success() {
        Ok(())
    } else {
        Err(format!("sync {}", report.outcome).into())
    }
}

fn print_text_output(report: &SyncReport) {
    println!("Sync {}", report.outcome);
    println!("=============");
    println!();
    for phase in &report.phases {
        println!(
            "  {:<14} +{} ~{} -{} ({} skipped)",
            phase.phase, phase.inserted, phase.updated, phase.deleted, phase.errors
        );
    }
    println!();
    println!("Database errors: {}", report.database_errors);
    println!("I/O errors:      {}", report.io_errors);
    println!("Duration:        {} ms", report.duration_ms);
    if let Some(cause) = &report.cause {
        println!("Cause:           {cause}");
    }
}
