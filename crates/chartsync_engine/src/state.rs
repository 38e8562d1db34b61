//! Sync bookkeeping kept in the local store.
//!
//! Values are written through the store like any other record, so they
//! live inside the run's savepoint and disappear with a rollback.

use crate::error::SyncResult;
use chartsync_model::{Domain, MiscEntry, Record, Timestamp};
use chartsync_store::{Filter, LocalStore};

/// Server time up to which observations have been fetched.
pub const WATERMARK_KEY: &str = "obs_sync_end_millis";
/// Start of the last recorded full sync.
pub const FULL_SYNC_START_KEY: &str = "full_sync_start_millis";
/// End of the last recorded full sync.
pub const FULL_SYNC_END_KEY: &str = "full_sync_end_millis";

/// Start and end of the last completed full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullSyncWindow {
    /// When the sync started.
    pub start: Timestamp,
    /// When the sync finished.
    pub end: Timestamp,
}

/// Typed access to the engine's misc entries.
#[derive(Clone, Copy)]
pub struct SyncStateStore<'a> {
    store: &'a dyn LocalStore,
}

impl<'a> SyncStateStore<'a> {
    /// Wraps a store.
    pub fn new(store: &'a dyn LocalStore) -> Self {
        Self { store }
    }

    /// Returns the observation watermark.
    pub fn watermark(&self) -> SyncResult<Option<Timestamp>> {
        self.get(WATERMARK_KEY)
    }

    /// Stores the observation watermark.
    pub fn set_watermark(&self, at: Timestamp) -> SyncResult<()> {
        self.set(WATERMARK_KEY, at)
    }

    /// Records the start of a full sync.
    pub fn record_full_sync_start(&self, at: Timestamp) -> SyncResult<()> {
        self.set(FULL_SYNC_START_KEY, at)
    }

    /// Records the end of a full sync.
    pub fn record_full_sync_end(&self, at: Timestamp) -> SyncResult<()> {
        self.set(FULL_SYNC_END_KEY, at)
    }

    /// Returns the last full-sync window.
    ///
    /// `None` unless both ends are recorded and the end is not before the
    /// start, which is the case while a newer full sync is still running.
    pub fn last_full_sync_window(&self) -> SyncResult<Option<FullSyncWindow>> {
        let start = self.get(FULL_SYNC_START_KEY)?;
        let end = self.get(FULL_SYNC_END_KEY)?;
        Ok(match (start, end) {
            (Some(start), Some(end)) if end >= start => Some(FullSyncWindow { start, end }),
            _ => None,
        })
    }

    fn get(&self, name: &str) -> SyncResult<Option<Timestamp>> {
        let records = self.store.query(Domain::Misc, &Filter::Key(name.to_string()))?;
        Ok(records.into_iter().find_map(|record| match record {
            Record::Misc(entry) => Some(Timestamp::from_millis(entry.value)),
            _ => None,
        }))
    }

    fn set(&self, name: &str, at: Timestamp) -> SyncResult<()> {
        let entry = MiscEntry {
            name: name.to_string(),
            value: at.millis(),
        };
        self.store.bulk_insert(Domain::Misc, vec![entry.into()])?;
        Ok(())
    }
}
