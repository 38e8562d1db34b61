//! Per-domain reconcilers.
//!
//! Each reconciler fetches one domain from the remote and brings the
//! local store in line with it. Reconcilers run inside the engine's
//! savepoint and may fail freely: the engine rolls back.

mod chart;
mod concepts;
mod forms;
mod locations;
mod observations;
mod orders;
mod patients;
mod users;

pub use chart::ChartReconciler;
pub use concepts::ConceptReconciler;
pub use forms::FormReconciler;
pub use locations::LocationReconciler;
pub use observations::ObservationReconciler;
pub use orders::OrderReconciler;
pub use patients::PatientReconciler;
pub use users::UserReconciler;

use crate::cancel::CancellationFlag;
use crate::concepts::ConceptCache;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::remote::RemoteClient;
use crate::state::SyncStateStore;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use chartsync_store::{Filter, LocalStore, Operation};
use std::collections::BTreeMap;
use std::time::Duration;

/// Everything a reconciler may use during one phase.
pub struct PhaseContext<'a> {
    /// Source of authoritative data.
    pub remote: &'a dyn RemoteClient,
    /// Local cache being reconciled.
    pub store: &'a dyn LocalStore,
    /// Engine configuration.
    pub config: &'a SyncConfig,
    /// The run's cancellation flag.
    pub cancel: &'a CancellationFlag,
    /// The engine's concept cache.
    pub concepts: &'a ConceptCache,
    /// Whether incremental observation fetching was requested.
    pub incremental_observations: bool,
}

impl<'a> PhaseContext<'a> {
    /// Returns the sync-state store over the local store.
    pub fn state(&self) -> SyncStateStore<'a> {
        SyncStateStore::new(self.store)
    }

    /// Fails with [`SyncError::Cancelled`](crate::SyncError::Cancelled) if
    /// cancellation is pending.
    pub fn checkpoint(&self, when: &str) -> SyncResult<()> {
        self.cancel.checkpoint(when)
    }

    /// Timeout for an ordinary fetch.
    pub fn fetch_timeout(&self) -> Duration {
        self.config.timeouts.default
    }

    /// Timeout for an encounter fetch.
    pub fn observations_timeout(&self) -> Duration {
        self.config.timeouts.observations
    }
}

/// Reconciles one domain.
pub trait Reconciler {
    /// The phase this reconciler implements.
    fn phase(&self) -> SyncPhase;

    /// Fetches the domain and applies it to the local store.
    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts>;
}

/// Returns the reconciler for a phase.
pub fn reconciler_for(phase: SyncPhase) -> Box<dyn Reconciler> {
    match phase {
        SyncPhase::Users => Box::new(UserReconciler),
        SyncPhase::Locations => Box::new(LocationReconciler),
        SyncPhase::ChartItems => Box::new(ChartReconciler),
        SyncPhase::Concepts => Box::new(ConceptReconciler),
        SyncPhase::Patients => Box::new(PatientReconciler),
        SyncPhase::Observations => Box::new(ObservationReconciler),
        SyncPhase::Orders => Box::new(OrderReconciler),
        SyncPhase::Forms => Box::new(FormReconciler),
    }
}

/// Diffs incoming records against the stored ones.
///
/// New keys become inserts and changed records become updates. With
/// `prune`, stored keys missing from `incoming` become deletes. Later
/// duplicates in `incoming` win.
pub(crate) fn diff(
    ctx: &PhaseContext<'_>,
    domain: Domain,
    incoming: Vec<Record>,
    prune: bool,
    counts: &mut DomainCounts,
) -> SyncResult<Vec<Operation>> {
    let existing: BTreeMap<String, Record> = ctx
        .store
        .query(domain, &Filter::All)?
        .into_iter()
        .map(|record| (record.key(), record))
        .collect();
    let incoming: BTreeMap<String, Record> = incoming
        .into_iter()
        .map(|record| (record.key(), record))
        .collect();

    let mut operations = Vec::new();
    if prune {
        for key in existing.keys().filter(|key| !incoming.contains_key(*key)) {
            operations.push(Operation::delete_key(domain, key.clone()));
            counts.deleted += 1;
        }
    }
    for (key, record) in incoming {
        match existing.get(&key) {
            None => {
                operations.push(Operation::Insert(record));
                counts.inserted += 1;
            }
            Some(current) if *current != record => {
                operations.push(Operation::Update(record));
                counts.updated += 1;
            }
            Some(_) => {}
        }
    }
    Ok(operations)
}

/// Applies a batch after a cancellation checkpoint.
pub(crate) fn apply(
    ctx: &PhaseContext<'_>,
    phase: SyncPhase,
    operations: Vec<Operation>,
) -> SyncResult<()> {
    ctx.checkpoint(&format!("before applying {phase} changes"))?;
    if !operations.is_empty() {
        ctx.store.apply_batch(operations)?;
    }
    Ok(())
}
