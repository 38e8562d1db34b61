//! The sync orchestrator.

use crate::cancel::CancellationFlag;
use crate::clock::{Clock, SystemClock};
use crate::concepts::ConceptCache;
use crate::config::SyncConfig;
use crate::error::{FailureKind, SyncError, SyncResult};
use crate::health::{AssumeAvailable, HealthMonitor};
use crate::phase::{SyncPhase, SyncRequest};
use crate::reconcile::{reconciler_for, PhaseContext};
use crate::remote::RemoteClient;
use crate::state::{FullSyncWindow, SyncStateStore};
use crate::stats::{SyncOutcome, SyncRunResult, SyncStats};
use crate::status::{Observers, ProgressTracker, SyncObserver, SyncStatus};
use chartsync_model::Timestamp;
use chartsync_store::LocalStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn};

/// Runs sync passes against a remote and a local store.
///
/// All work of one run happens inside a single savepoint: the run either
/// commits every selected phase or leaves the store as it found it. The
/// engine does not guard against concurrent runs; use
/// [`SyncScheduler`](crate::SyncScheduler) for that.
pub struct SyncEngine<R: RemoteClient, S: LocalStore> {
    config: SyncConfig,
    remote: Arc<R>,
    store: Arc<S>,
    health: Arc<dyn HealthMonitor>,
    clock: Arc<dyn Clock>,
    cancel: CancellationFlag,
    observers: Observers,
    concepts: ConceptCache,
}

impl<R: RemoteClient, S: LocalStore> SyncEngine<R, S> {
    /// Creates an engine that assumes the remote is reachable.
    pub fn new(config: SyncConfig, remote: R, store: S) -> Self {
        Self {
            config,
            remote: Arc::new(remote),
            store: Arc::new(store),
            health: Arc::new(AssumeAvailable),
            clock: Arc::new(SystemClock),
            cancel: CancellationFlag::new(),
            observers: Observers::default(),
            concepts: ConceptCache::new(),
        }
    }

    /// Sets the health monitor consulted at the start of each run.
    pub fn with_health(mut self, health: Arc<dyn HealthMonitor>) -> Self {
        self.health = health;
        self
    }

    /// Sets the clock used for full-sync timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a status observer.
    pub fn add_observer(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.add(observer);
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the remote client.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the local store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Requests cancellation of the active run, or of the next one.
    pub fn cancel(&self) {
        info!("sync cancellation requested");
        self.cancel.cancel();
    }

    /// Returns a handle that can cancel runs from another thread.
    pub fn cancel_handle(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Returns the concept cache.
    pub fn concept_cache(&self) -> &ConceptCache {
        &self.concepts
    }

    /// Returns the start and end of the last recorded full sync.
    pub fn last_full_sync_window(&self) -> SyncResult<Option<FullSyncWindow>> {
        SyncStateStore::new(&*self.store).last_full_sync_window()
    }

    /// Returns the observation watermark.
    pub fn watermark(&self) -> SyncResult<Option<Timestamp>> {
        SyncStateStore::new(&*self.store).watermark()
    }

    /// Runs one sync pass.
    ///
    /// Never fails: failures and cancellation are reported through the
    /// returned result and the observers.
    pub fn run(&self, request: &SyncRequest) -> SyncRunResult {
        let started = Instant::now();
        let span = info_span!("sync_run", full = request.full_sync);
        let _enter = span.enter();

        let mut stats = SyncStats::default();
        let mut phases_run = Vec::new();

        if self.health.is_remote_definitely_unavailable() {
            error!("abort sync: remote server is unavailable");
            self.observers.emit(&SyncStatus::Failed);
            return finish(
                SyncOutcome::Failed,
                phases_run,
                stats,
                Some(SyncError::Unavailable),
                started,
            );
        }

        self.observers.emit(&SyncStatus::Started);
        if let Err(e) = self.cancel.checkpoint("before work started") {
            info!("sync cancelled before work started");
            self.observers.emit(&SyncStatus::Canceled);
            return finish(SyncOutcome::Canceled, phases_run, stats, Some(e), started);
        }

        let phases = request.selected_phases();
        info!(
            phases = ?phases,
            incremental_observations = request.incremental_observations,
            record_full_sync_window = request.record_full_sync_window,
            "sync started"
        );

        let mut progress = ProgressTracker::new(&self.observers);
        progress.report(0, "sync in progress");

        let savepoint = self.config.savepoint_name.as_str();
        if let Err(e) = self.store.begin_savepoint(savepoint) {
            return self.fail(SyncError::from(e), phases_run, stats, started);
        }

        let outcome = self.run_phases(request, &phases, &mut progress, &mut stats, &mut phases_run);
        match outcome {
            Ok(()) => match self.store.release_savepoint(savepoint) {
                Ok(()) => {
                    self.observers.emit(&SyncStatus::Completed);
                    let result = finish(SyncOutcome::Succeeded, phases_run, stats, None, started);
                    info!(elapsed_ms = result.duration.as_millis() as u64, "sync completed");
                    result
                }
                Err(e) => {
                    error!(error = %e, "failed to commit sync");
                    stats.database_errors += 1;
                    self.rollback();
                    self.observers.emit(&SyncStatus::Failed);
                    finish(SyncOutcome::Failed, phases_run, stats, Some(e.into()), started)
                }
            },
            Err(e) => {
                self.rollback();
                self.fail(e, phases_run, stats, started)
            }
        }
    }

    fn run_phases(
        &self,
        request: &SyncRequest,
        phases: &[SyncPhase],
        progress: &mut ProgressTracker<'_>,
        stats: &mut SyncStats,
        phases_run: &mut Vec<SyncPhase>,
    ) -> SyncResult<()> {
        let state = SyncStateStore::new(&*self.store);
        if request.record_full_sync_window {
            let now = self.clock.now();
            info!(at = %now, "recording full sync start");
            state.record_full_sync_start(now)?;
        }

        let ctx = PhaseContext {
            remote: &*self.remote,
            store: &*self.store,
            config: &self.config,
            cancel: &self.cancel,
            concepts: &self.concepts,
            incremental_observations: request.incremental_observations,
        };
        let increment = 100 / phases.len().max(1) as u32;

        for &phase in phases {
            self.cancel.checkpoint(&format!("before {phase}"))?;
            let span = info_span!("sync_phase", %phase);
            let _enter = span.enter();

            info!("--- begin {phase} ---");
            progress.report(0, phase.label());
            phases_run.push(phase);

            let phase_started = Instant::now();
            let counts = match reconciler_for(phase).reconcile(&ctx) {
                Ok(counts) => counts,
                Err(e) => {
                    stats.domains.entry(phase).or_default().errors += 1;
                    return Err(e);
                }
            };
            info!(
                elapsed_ms = phase_started.elapsed().as_millis() as u64,
                inserted = counts.inserted,
                updated = counts.updated,
                deleted = counts.deleted,
                "--- end {phase} ---"
            );
            stats.domains.insert(phase, counts);
            progress.report(increment, phase.label());
        }

        progress.finish("completing sync");
        if request.record_full_sync_window {
            let now = self.clock.now();
            info!(at = %now, "recording full sync end");
            state.record_full_sync_end(now)?;
        }
        Ok(())
    }

    fn rollback(&self) {
        self.concepts.invalidate();
        if let Err(e) = self.store.rollback_savepoint(&self.config.savepoint_name) {
            error!(error = %e, "failed to roll back sync savepoint");
        }
    }

    fn fail(
        &self,
        cause: SyncError,
        phases_run: Vec<SyncPhase>,
        mut stats: SyncStats,
        started: Instant,
    ) -> SyncRunResult {
        let outcome = match cause.classify() {
            FailureKind::Canceled => {
                info!(reason = %cause, "sync canceled");
                self.observers.emit(&SyncStatus::Canceled);
                SyncOutcome::Canceled
            }
            FailureKind::Database => {
                error!(error = %cause, "error performing database operation during sync");
                stats.database_errors += 1;
                self.observers.emit(&SyncStatus::Failed);
                SyncOutcome::Failed
            }
            FailureKind::Io => {
                warn!(error = %cause, retryable = cause.is_retryable(), "sync failed");
                stats.io_errors += 1;
                self.observers.emit(&SyncStatus::Failed);
                SyncOutcome::Failed
            }
        };
        finish(outcome, phases_run, stats, Some(cause), started)
    }
}

fn finish(
    outcome: SyncOutcome,
    phases_run: Vec<SyncPhase>,
    stats: SyncStats,
    cause: Option<SyncError>,
    started: Instant,
) -> SyncRunResult {
    SyncRunResult {
        outcome,
        phases_run,
        stats,
        cause,
        duration: started.elapsed(),
    }
}
