//! Status command implementation.

use chartsync_engine::SyncStateStore;
use chartsync_model::Domain;
use chartsync_store::{FileStore, Filter, LocalStore};
use serde::Serialize;
use std::path::Path;

/// Sync bookkeeping of a local cache.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Cache path.
    pub path: String,
    /// Observation watermark in epoch milliseconds.
    pub watermark: Option<i64>,
    /// Start of the last full sync.
    pub last_full_sync_start: Option<i64>,
    /// End of the last full sync.
    pub last_full_sync_end: Option<i64>,
    /// Record counts per domain.
    pub counts: Vec<DomainCount>,
    /// Temporary observations awaiting confirmation.
    pub temporary_observations: usize,
}

/// Record count of one domain.
#[derive(Debug, Serialize)]
pub struct DomainCount {
    /// Domain name.
    pub domain: &'static str,
    /// Number of records.
    pub records: usize,
}

/// Collects the status of the cache at `path`.
pub fn collect(path: &Path) -> Result<StatusReport, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No cache found at {:?}", path).into());
    }
    let store = FileStore::open(path)?;
    let state = SyncStateStore::new(&store);
    let window = state.last_full_sync_window()?;

    let mut counts = Vec::with_capacity(Domain::ALL.len());
    for domain in Domain::ALL {
        counts.push(DomainCount {
            domain: domain.as_str(),
            records: store.count(domain, &Filter::All)?,
        });
    }

    Ok(StatusReport {
        path: path.display().to_string(),
        watermark: state.watermark()?.map(|t| t.millis()),
        last_full_sync_start: window.as_ref().map(|w| w.start.millis()),
        last_full_sync_end: window.as_ref().map(|w| w.end.millis()),
        counts,
        temporary_observations: store.count(Domain::Observations, &Filter::Temporary)?,
    })
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = collect(path)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }
    Ok(())
}

fn print_text_output(report: &StatusReport) {
    println!("Cache Status");
    println!("============");
    println!();
    println!("Path: {}", report.path);
    match report.watermark {
        Some(millis) => println!("Observation watermark: {millis}"),
        None => println!("Observation watermark: none (next sync fetches everything)"),
    }
    match (report.last_full_sync_start, report.last_full_sync_end) {
        (Some(start), Some(end)) => println!("Last full sync: {start} .. {end} ({} ms)", end - start),
        _ => println!("Last full sync: never"),
    }
    println!();
    println!("Records:");
    for count in &report.counts {
        println!("  {:<14} {}", count.domain, count.records);
    }
    if report.temporary_observations > 0 {
        println!();
        println!("Unconfirmed observations: {}", report.temporary_observations);
    }
}
