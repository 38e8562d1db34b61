//! Status broadcasting.
//!
//! Every run emits a sequence of [`SyncStatus`] values to the registered
//! observers: `Started`, a series of `InProgress`, then exactly one of
//! `Completed`, `Failed` or `Canceled`. A run refused by the health check
//! emits `Failed` alone.

use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Progress report within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Percentage points added by this report.
    pub increment: u32,
    /// Cumulative percentage, at most 100.
    pub percent: u32,
    /// What the engine is doing.
    pub label: String,
}

/// A status transition of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The run began.
    Started,
    /// The run made progress.
    InProgress(Progress),
    /// The run committed.
    Completed,
    /// The run failed.
    Failed,
    /// The run was cancelled.
    Canceled,
}

impl SyncStatus {
    /// Returns true for `Completed`, `Failed` and `Canceled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Failed | SyncStatus::Canceled
        )
    }
}

/// Receives status transitions.
///
/// Called on the thread running the sync; implementations must not block.
pub trait SyncObserver: Send + Sync {
    /// Handles one transition.
    fn on_status(&self, status: &SyncStatus);
}

impl<F> SyncObserver for F
where
    F: Fn(&SyncStatus) + Send + Sync,
{
    fn on_status(&self, status: &SyncStatus) {
        self(status)
    }
}

/// Registered observers of an engine.
#[derive(Default)]
pub(crate) struct Observers {
    list: RwLock<Vec<Arc<dyn SyncObserver>>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn SyncObserver>) {
        self.list.write().push(observer);
    }

    /// Delivers a status to every observer. A panicking observer is logged
    /// and does not affect the run or the other observers.
    pub(crate) fn emit(&self, status: &SyncStatus) {
        trace!(?status, "status");
        let observers = self.list.read().clone();
        for observer in observers {
            let delivered = catch_unwind(AssertUnwindSafe(|| observer.on_status(status)));
            if delivered.is_err() {
                warn!(?status, "sync observer panicked");
            }
        }
    }
}

/// Cumulative progress of one run.
pub(crate) struct ProgressTracker<'a> {
    observers: &'a Observers,
    percent: u32,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(observers: &'a Observers) -> Self {
        Self {
            observers,
            percent: 0,
        }
    }

    pub(crate) fn report(&mut self, increment: u32, label: &str) {
        self.percent = (self.percent + increment).min(100);
        self.observers.emit(&SyncStatus::InProgress(Progress {
            increment,
            percent: self.percent,
            label: label.to_string(),
        }));
    }

    /// Reports the remainder up to 100%.
    pub(crate) fn finish(&mut self, label: &str) {
        let remaining = 100 - self.percent;
        self.report(remaining, label);
    }
}

/// Forwards statuses to a tokio broadcast channel.
///
/// Sending never blocks; receivers that fall behind lose messages.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<SyncStatus>,
}

impl BroadcastObserver {
    /// Creates an observer with the given channel capacity.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<SyncStatus>) {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Creates another receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.sender.subscribe()
    }
}

impl SyncObserver for BroadcastObserver {
    fn on_status(&self, status: &SyncStatus) {
        // No receivers is fine.
        let _ = self.sender.send(status.clone());
    }
}

/// Records every status it receives.
#[derive(Debug, Default)]
pub struct StatusLog {
    statuses: Mutex<Vec<SyncStatus>>,
}

impl StatusLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statuses received so far.
    pub fn statuses(&self) -> Vec<SyncStatus> {
        self.statuses.lock().clone()
    }

    /// Returns the progress labels received so far.
    pub fn labels(&self) -> Vec<String> {
        self.statuses
            .lock()
            .iter()
            .filter_map(|status| match status {
                SyncStatus::InProgress(progress) => Some(progress.label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the last status received.
    pub fn last(&self) -> Option<SyncStatus> {
        self.statuses.lock().last().cloned()
    }

    /// Forgets every status.
    pub fn clear(&self) {
        self.statuses.lock().clear();
    }
}

impl SyncObserver for StatusLog {
    fn on_status(&self, status: &SyncStatus) {
        self.statuses.lock().push(status.clone());
    }
}

/// State of the first full sync after installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialSyncStatus {
    /// No sync has been requested.
    #[default]
    Unknown,
    /// A sync was requested but has not started.
    Requested,
    /// A sync is running.
    Started,
    /// A sync completed.
    Succeeded,
    /// The last sync failed.
    Failed,
    /// The last sync was cancelled.
    Canceled,
}

/// Follows the status stream to track [`InitialSyncStatus`].
///
/// Once a sync has succeeded the status stays `Succeeded`.
#[derive(Debug, Default)]
pub struct InitialSyncTracker {
    status: RwLock<InitialSyncStatus>,
}

impl InitialSyncTracker {
    /// Creates a tracker in the `Unknown` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    pub fn status(&self) -> InitialSyncStatus {
        *self.status.read()
    }

    /// Records that a sync was requested.
    pub fn mark_requested(&self) {
        let mut status = self.status.write();
        if *status != InitialSyncStatus::Succeeded {
            *status = InitialSyncStatus::Requested;
        }
    }
}

impl SyncObserver for InitialSyncTracker {
    fn on_status(&self, event: &SyncStatus) {
        use InitialSyncStatus as S;
        let mut status = self.status.write();
        *status = match (*status, event) {
            (S::Requested, SyncStatus::Started) => S::Started,
            (S::Started, SyncStatus::Completed) => S::Succeeded,
            (S::Requested | S::Started, SyncStatus::Failed) => S::Failed,
            (S::Requested | S::Started, SyncStatus::Canceled) => S::Canceled,
            (current, _) => current,
        };
    }
}
