//! # chartsync engine
//!
//! Synchronization engine that reconciles the device's local cache with
//! the authoritative server, one data domain at a time.
//!
//! This crate provides:
//! - [`SyncEngine`], the orchestrator driving an ordered sequence of phases
//! - One reconciler per domain (users, locations, chart layout, concepts,
//!   patients, observations, orders, forms)
//! - [`SyncStateStore`] for the observation watermark and full-sync window
//! - [`CancellationFlag`] for cooperative, edge-triggered cancellation
//! - Status reporting to [`SyncObserver`]s
//! - The [`RemoteClient`] boundary with an HTTP implementation and a mock
//! - [`SyncScheduler`], which keeps at most one run active at a time
//!
//! ## Architecture
//!
//! A run opens one named savepoint on the local store and executes the
//! selected phases in fixed [`SyncPhase`] order inside it:
//! 1. Fetch the domain from the remote
//! 2. Convert the response into store operations
//! 3. Apply them, checking for cancellation between costly steps
//!
//! ## Key Invariants
//!
//! - Either every selected phase's changes are committed or none are
//! - The watermark never advances past data that was rolled back
//! - No temporary observation survives a successful observation phase
//! - [`SyncEngine::run`] never fails; every outcome is a [`SyncRunResult`]

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod clock;
mod concepts;
mod config;
mod engine;
mod error;
mod health;
mod http;
mod phase;
pub mod reconcile;
mod remote;
mod scheduler;
mod state;
mod stats;
mod status;

pub use cancel::CancellationFlag;
pub use clock::{Clock, ManualClock, SystemClock};
pub use concepts::{ConceptCache, ConceptSnapshot};
pub use config::{FetchTimeouts, SyncConfig};
pub use engine::SyncEngine;
pub use error::{FailureKind, SyncError, SyncResult};
pub use health::{AssumeAvailable, HealthMonitor, HealthState};
pub use http::{HttpClient, HttpFailure, HttpRemoteClient};
pub use phase::{SyncPhase, SyncRequest};
pub use remote::{CallRecord, MockFailure, MockRemote, RemoteCall, RemoteClient, RemoteEndpoint};
pub use scheduler::SyncScheduler;
pub use state::{FullSyncWindow, SyncStateStore};
pub use stats::{DomainCounts, SyncOutcome, SyncRunResult, SyncStats};
pub use status::{
    BroadcastObserver, InitialSyncStatus, InitialSyncTracker, Progress, StatusLog, SyncObserver,
    SyncStatus,
};
