//! Directory-backed durable store.
//!
//! Layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK        # Advisory lock, one process at a time
//! └─ CACHE       # CBOR snapshot of every table
//! ```
//!
//! The working set lives in a [`MemoryStore`]. The snapshot is rewritten
//! after each mutation made while no savepoint is open, and when the
//! outermost savepoint is released. That savepoint closes only once its
//! snapshot is written. Rolled-back work never reaches disk.

use crate::error::{StoreError, StoreResult};
use crate::memory::{MemoryStore, Tables};
use crate::operation::{Filter, Operation};
use crate::store::LocalStore;
use chartsync_model::{Domain, Record};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOCK_FILE: &str = "LOCK";
const CACHE_FILE: &str = "CACHE";
const CACHE_TEMP: &str = "CACHE.tmp";

/// A [`MemoryStore`] persisted to a locked directory.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    /// Serializes snapshot writes.
    persist: Mutex<()>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] if another process holds the directory
    /// - [`StoreError::Codec`] if the snapshot cannot be decoded
    /// - [`StoreError::Io`] on file system errors
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let tables = Self::load(&path.join(CACHE_FILE))?;
        info!(path = %path.display(), "opened local store");

        Ok(Self {
            path: path.to_path_buf(),
            memory: MemoryStore::with_tables(tables),
            persist: Mutex::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current content.
    pub fn tables(&self) -> Tables {
        self.memory.tables()
    }

    fn load(cache_path: &Path) -> StoreResult<Tables> {
        if !cache_path.exists() {
            return Ok(Tables::new());
        }
        let file = File::open(cache_path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Tables::new());
        }
        ciborium::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Codec(format!("failed to decode snapshot: {e}")))
    }

    /// Writes the current content to disk unless a savepoint is open.
    ///
    /// Uses write-then-rename so a crash leaves either the old or the new
    /// snapshot in place.
    pub fn flush(&self) -> StoreResult<()> {
        let _guard = self.persist.lock();
        if self.memory.in_savepoint() {
            return Ok(());
        }
        self.write_snapshot(&self.memory.tables())
    }

    fn write_snapshot(&self, tables: &Tables) -> StoreResult<()> {
        let temp_path = self.path.join(CACHE_TEMP);
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            ciborium::into_writer(tables, &mut writer)
                .map_err(|e| StoreError::Codec(format!("failed to encode snapshot: {e}")))?;
            writer.flush()?;
            writer
                .into_inner()
                .map_err(|e| StoreError::Io(e.into_error()))?
                .sync_all()?;
        }
        fs::rename(&temp_path, self.path.join(CACHE_FILE))?;
        self.sync_directory()?;
        debug!(path = %self.path.display(), "snapshot written");
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn query(&self, domain: Domain, filter: &Filter) -> StoreResult<Vec<Record>> {
        self.memory.query(domain, filter)
    }

    fn count(&self, domain: Domain, filter: &Filter) -> StoreResult<usize> {
        self.memory.count(domain, filter)
    }

    fn bulk_insert(&self, domain: Domain, records: Vec<Record>) -> StoreResult<usize> {
        let count = self.memory.bulk_insert(domain, records)?;
        self.flush()?;
        Ok(count)
    }

    fn delete(&self, domain: Domain, filter: &Filter) -> StoreResult<usize> {
        let count = self.memory.delete(domain, filter)?;
        self.flush()?;
        Ok(count)
    }

    fn apply_batch(&self, operations: Vec<Operation>) -> StoreResult<usize> {
        let count = self.memory.apply_batch(operations)?;
        self.flush()?;
        Ok(count)
    }

    fn begin_savepoint(&self, name: &str) -> StoreResult<()> {
        self.memory.begin_savepoint(name)
    }

    fn rollback_savepoint(&self, name: &str) -> StoreResult<()> {
        self.memory.rollback_savepoint(name)
    }

    fn release_savepoint(&self, name: &str) -> StoreResult<()> {
        let open = self.memory.open_savepoints();
        if open.iter().rposition(|sp| sp == name) != Some(0) {
            return self.memory.release_savepoint(name);
        }
        // Outermost: the savepoint stays open until the snapshot is on disk.
        let _guard = self.persist.lock();
        self.write_snapshot(&self.memory.tables())?;
        self.memory.release_savepoint(name)
    }
}
