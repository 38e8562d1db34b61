//! Batch operations and record selection.

use chartsync_model::{Domain, Record};
use std::collections::BTreeSet;

/// Selects records within one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every record.
    All,
    /// The record with this key.
    Key(String),
    /// Records with any of these keys.
    Keys(BTreeSet<String>),
    /// Records belonging to any of these patients.
    Patients(BTreeSet<String>),
    /// Speculative local writes.
    Temporary,
}

impl Filter {
    /// Builds a patient filter.
    pub fn patients<I, S>(uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Patients(uuids.into_iter().map(Into::into).collect())
    }

    /// Builds a key-set filter.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Returns true if the record stored under `key` is selected.
    pub fn matches(&self, key: &str, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Key(k) => k == key,
            Filter::Keys(keys) => keys.contains(key),
            Filter::Patients(patients) => record
                .patient_uuid()
                .is_some_and(|uuid| patients.contains(uuid)),
            Filter::Temporary => record.is_temporary(),
        }
    }
}

/// One mutation in an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Inserts the record, replacing any record with the same key.
    Insert(Record),
    /// Replaces an existing record; fails if the key is absent.
    Update(Record),
    /// Deletes the selected records.
    Delete {
        /// Domain to delete from.
        domain: Domain,
        /// Records to delete.
        filter: Filter,
    },
}

impl Operation {
    /// Returns the domain the operation touches.
    pub fn domain(&self) -> Domain {
        match self {
            Operation::Insert(record) | Operation::Update(record) => record.domain(),
            Operation::Delete { domain, .. } => *domain,
        }
    }

    /// Creates a delete of a single key.
    pub fn delete_key(domain: Domain, key: impl Into<String>) -> Self {
        Operation::Delete {
            domain,
            filter: Filter::Key(key.into()),
        }
    }
}
