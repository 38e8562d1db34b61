//! The local store boundary.

use crate::error::StoreResult;
use crate::operation::{Filter, Operation};
use chartsync_model::{Domain, Record};

/// Durable keyed record storage, one table per [`Domain`].
///
/// Implementations must be safe to share across threads. All methods take
/// `&self`; implementations use interior locking.
///
/// # Transactions
///
/// Between `begin_savepoint(name)` and the matching `release_savepoint` or
/// `rollback_savepoint`, mutations are visible to this store's own reads
/// but are not durable. Rollback restores the state at `begin_savepoint`.
pub trait LocalStore: Send + Sync {
    /// Returns the selected records of a domain, ordered by key.
    fn query(&self, domain: Domain, filter: &Filter) -> StoreResult<Vec<Record>>;

    /// Counts the selected records of a domain.
    fn count(&self, domain: Domain, filter: &Filter) -> StoreResult<usize> {
        Ok(self.query(domain, filter)?.len())
    }

    /// Inserts records into a domain, replacing records with equal keys.
    ///
    /// Returns the number of records written. The insert is atomic: a
    /// record of the wrong domain rejects the whole call.
    fn bulk_insert(&self, domain: Domain, records: Vec<Record>) -> StoreResult<usize>;

    /// Deletes the selected records; returns how many were removed.
    fn delete(&self, domain: Domain, filter: &Filter) -> StoreResult<usize>;

    /// Applies operations atomically, in order.
    ///
    /// Either every operation takes effect or none does. Returns the number
    /// of operations applied.
    fn apply_batch(&self, operations: Vec<Operation>) -> StoreResult<usize>;

    /// Opens a named savepoint.
    fn begin_savepoint(&self, name: &str) -> StoreResult<()>;

    /// Restores the state captured by the named savepoint and closes it.
    fn rollback_savepoint(&self, name: &str) -> StoreResult<()>;

    /// Closes the named savepoint, keeping its changes.
    fn release_savepoint(&self, name: &str) -> StoreResult<()>;
}
