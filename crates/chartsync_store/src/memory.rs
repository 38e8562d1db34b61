//! In-memory store with named savepoints.

use crate::error::{StoreError, StoreResult};
use crate::operation::{Filter, Operation};
use crate::store::LocalStore;
use chartsync_model::{Domain, Record};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The full content of a store: one keyed table per domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    tables: BTreeMap<Domain, BTreeMap<String, Record>>,
}

impl Tables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record stored under `key`.
    pub fn get(&self, domain: Domain, key: &str) -> Option<&Record> {
        self.tables.get(&domain).and_then(|table| table.get(key))
    }

    /// Returns the number of records in a domain.
    pub fn len(&self, domain: Domain) -> usize {
        self.tables.get(&domain).map_or(0, BTreeMap::len)
    }

    /// Returns true if no domain holds any record.
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(BTreeMap::is_empty)
    }

    /// Iterates the records of a domain in key order.
    pub fn records(&self, domain: Domain) -> impl Iterator<Item = &Record> {
        self.tables.get(&domain).into_iter().flat_map(BTreeMap::values)
    }

    fn select(&self, domain: Domain, filter: &Filter) -> Vec<Record> {
        let Some(table) = self.tables.get(&domain) else {
            return Vec::new();
        };
        match filter {
            Filter::Key(key) => table.get(key).cloned().into_iter().collect(),
            _ => table
                .iter()
                .filter(|(key, record)| filter.matches(key, record))
                .map(|(_, record)| record.clone())
                .collect(),
        }
    }

    fn insert(&mut self, domain: Domain, record: Record) -> StoreResult<()> {
        let actual = record.domain();
        if actual != domain {
            return Err(StoreError::DomainMismatch {
                expected: domain,
                actual,
            });
        }
        self.tables
            .entry(domain)
            .or_default()
            .insert(record.key(), record);
        Ok(())
    }

    fn update(&mut self, record: Record) -> StoreResult<()> {
        let domain = record.domain();
        let key = record.key();
        match self.tables.get_mut(&domain).and_then(|t| t.get_mut(&key)) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::conflict(domain, key, "update of missing record")),
        }
    }

    fn delete(&mut self, domain: Domain, filter: &Filter) -> usize {
        let Some(table) = self.tables.get_mut(&domain) else {
            return 0;
        };
        let before = table.len();
        match filter {
            Filter::All => table.clear(),
            Filter::Key(key) => {
                table.remove(key);
            }
            _ => table.retain(|key, record| !filter.matches(key, record)),
        }
        before - table.len()
    }

    fn apply(&mut self, operation: Operation) -> StoreResult<()> {
        match operation {
            Operation::Insert(record) => self.insert(record.domain(), record),
            Operation::Update(record) => self.update(record),
            Operation::Delete { domain, filter } => {
                self.delete(domain, &filter);
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
struct Savepoint {
    name: String,
    snapshot: Tables,
}

#[derive(Debug, Default)]
struct Inner {
    data: Tables,
    savepoints: Vec<Savepoint>,
}

impl Inner {
    fn savepoint_position(&self, name: &str) -> StoreResult<usize> {
        self.savepoints
            .iter()
            .rposition(|sp| sp.name == name)
            .ok_or_else(|| StoreError::NoSuchSavepoint(name.to_string()))
    }
}

/// A savepoint-capable store held entirely in memory.
///
/// Suitable for tests and as the working set of [`FileStore`](crate::FileStore).
/// Each open savepoint holds a full copy of the tables taken when it began.
///
/// # Example
///
/// ```rust
/// use chartsync_model::{Domain, Record, User};
/// use chartsync_store::{Filter, LocalStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.begin_savepoint("sync").unwrap();
/// let user = Record::User(User { uuid: "u1".into(), full_name: "Ada".into() });
/// store.bulk_insert(Domain::Users, vec![user]).unwrap();
/// store.rollback_savepoint("sync").unwrap();
/// assert_eq!(store.count(Domain::Users, &Filter::All).unwrap(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given tables.
    #[must_use]
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            inner: RwLock::new(Inner {
                data: tables,
                savepoints: Vec::new(),
            }),
        }
    }

    /// Returns a copy of the current content, including uncommitted changes.
    #[must_use]
    pub fn tables(&self) -> Tables {
        self.inner.read().data.clone()
    }

    /// Returns the names of open savepoints, outermost first.
    #[must_use]
    pub fn open_savepoints(&self) -> Vec<String> {
        self.inner
            .read()
            .savepoints
            .iter()
            .map(|sp| sp.name.clone())
            .collect()
    }

    /// Returns true if any savepoint is open.
    #[must_use]
    pub fn in_savepoint(&self) -> bool {
        !self.inner.read().savepoints.is_empty()
    }
}

impl LocalStore for MemoryStore {
    fn query(&self, domain: Domain, filter: &Filter) -> StoreResult<Vec<Record>> {
        Ok(self.inner.read().data.select(domain, filter))
    }

    fn count(&self, domain: Domain, filter: &Filter) -> StoreResult<usize> {
        let inner = self.inner.read();
        if matches!(filter, Filter::All) {
            return Ok(inner.data.len(domain));
        }
        Ok(inner.data.select(domain, filter).len())
    }

    fn bulk_insert(&self, domain: Domain, records: Vec<Record>) -> StoreResult<usize> {
        if let Some(bad) = records.iter().find(|r| r.domain() != domain) {
            return Err(StoreError::DomainMismatch {
                expected: domain,
                actual: bad.domain(),
            });
        }
        let count = records.len();
        let mut inner = self.inner.write();
        for record in records {
            inner.data.insert(domain, record)?;
        }
        Ok(count)
    }

    fn delete(&self, domain: Domain, filter: &Filter) -> StoreResult<usize> {
        Ok(self.inner.write().data.delete(domain, filter))
    }

    fn apply_batch(&self, operations: Vec<Operation>) -> StoreResult<usize> {
        if operations.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.write();
        let mut staged = inner.data.clone();
        let count = operations.len();
        for operation in operations {
            staged.apply(operation)?;
        }
        inner.data = staged;
        Ok(count)
    }

    fn begin_savepoint(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let snapshot = inner.data.clone();
        inner.savepoints.push(Savepoint {
            name: name.to_string(),
            snapshot,
        });
        debug!(savepoint = name, depth = inner.savepoints.len(), "savepoint opened");
        Ok(())
    }

    fn rollback_savepoint(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let position = inner.savepoint_position(name)?;
        let mut closed = inner.savepoints.split_off(position);
        inner.data = closed.swap_remove(0).snapshot;
        debug!(savepoint = name, depth = inner.savepoints.len(), "savepoint rolled back");
        Ok(())
    }

    fn release_savepoint(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let position = inner.savepoint_position(name)?;
        inner.savepoints.truncate(position);
        debug!(savepoint = name, depth = inner.savepoints.len(), "savepoint released");
        Ok(())
    }
}
