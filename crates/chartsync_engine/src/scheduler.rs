//! At most one sync at a time.

use crate::engine::SyncEngine;
use crate::phase::SyncRequest;
use crate::remote::RemoteClient;
use crate::stats::SyncRunResult;
use crate::status::{InitialSyncStatus, InitialSyncTracker};
use chartsync_store::LocalStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

/// Starts runs on the tokio blocking pool, refusing to overlap them.
pub struct SyncScheduler<R: RemoteClient, S: LocalStore> {
    engine: Arc<SyncEngine<R, S>>,
    runtime: Handle,
    busy: Arc<AtomicBool>,
    tracker: Arc<InitialSyncTracker>,
}

/// Clears the busy flag when a run ends, including by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<R, S> SyncScheduler<R, S>
where
    R: RemoteClient + 'static,
    S: LocalStore + 'static,
{
    /// Creates a scheduler spawning runs on `runtime`.
    pub fn new(engine: Arc<SyncEngine<R, S>>, runtime: Handle) -> Self {
        let tracker = Arc::new(InitialSyncTracker::new());
        engine.add_observer(tracker.clone());
        Self {
            engine,
            runtime,
            busy: Arc::new(AtomicBool::new(false)),
            tracker,
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<SyncEngine<R, S>> {
        &self.engine
    }

    /// Starts a run unless one is active or pending.
    ///
    /// Returns `None` when the request was refused.
    pub fn request_sync(&self, request: SyncRequest) -> Option<JoinHandle<SyncRunResult>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("not starting sync: a sync is already active or pending");
            return None;
        }
        self.tracker.mark_requested();

        let guard = BusyGuard(Arc::clone(&self.busy));
        let engine = Arc::clone(&self.engine);
        Some(self.runtime.spawn_blocking(move || {
            let _guard = guard;
            engine.run(&request)
        }))
    }

    /// Returns true while a run is active or pending.
    pub fn is_syncing(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Requests cancellation of the active run.
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Returns the initial-sync status.
    pub fn initial_sync_status(&self) -> InitialSyncStatus {
        self.tracker.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::remote::{MockRemote, RemoteCall};
    use crate::stats::SyncOutcome;
    use chartsync_store::MemoryStore;
    use std::sync::mpsc;
    use std::time::Duration;

    fn scheduler() -> SyncScheduler<MockRemote, MemoryStore> {
        let engine = SyncEngine::new(SyncConfig::default(), MockRemote::new(), MemoryStore::new());
        SyncScheduler::new(Arc::new(engine), Handle::current())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_and_tracks_initial_sync() {
        let scheduler = scheduler();
        assert_eq!(scheduler.initial_sync_status(), InitialSyncStatus::Unknown);
        let result = scheduler.request_sync(SyncRequest::full()).unwrap().await.unwrap();
        assert_eq!(result.outcome, SyncOutcome::Succeeded);
        assert!(!scheduler.is_syncing());
        assert_eq!(scheduler.initial_sync_status(), InitialSyncStatus::Succeeded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn refuses_overlapping_runs() {
        let scheduler = scheduler();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = parking_lot::Mutex::new(release_rx);
        let entered_tx = parking_lot::Mutex::new(entered_tx);
        scheduler.engine().remote().on_call(move |call| {
            if *call == RemoteCall::Users {
                let _ = entered_tx.lock().send(());
                let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
            }
        });

        let first = scheduler.request_sync(SyncRequest::new()).unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(scheduler.is_syncing());
        assert!(scheduler.request_sync(SyncRequest::new()).is_none());

        release_tx.send(()).unwrap();
        assert!(first.await.unwrap().is_success());
        assert!(scheduler.request_sync(SyncRequest::new()).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_reaches_the_running_engine() {
        let scheduler = scheduler();
        let handle = scheduler.engine().cancel_handle();
        scheduler.engine().remote().on_call(move |call| {
            if *call == RemoteCall::Locations {
                handle.cancel();
            }
        });
        let result = scheduler.request_sync(SyncRequest::new()).unwrap().await.unwrap();
        assert_eq!(result.outcome, SyncOutcome::Canceled);
        assert_eq!(scheduler.initial_sync_status(), InitialSyncStatus::Canceled);
    }
}
