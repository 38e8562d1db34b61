//! Observations: full or incremental fetch, then temporary-record cleanup.
//!
//! A full fetch replaces the observations of every patient present in the
//! response. An incremental fetch asks only for encounters recorded after
//! the stored watermark and inserts them; the server sends corrections as
//! new encounters, never as edits. Either way the response's snapshot time
//! becomes the new watermark. Without one the watermark is left as it was.
//!
//! Temporary observations are written on the device before the server has
//! confirmed them. They are purged at the end of every successful phase.

use super::{PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::wire::PatientRecordResponse;
use chartsync_model::{Domain, Record, Timestamp};
use chartsync_store::Filter;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// How observations are fetched in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Incremental(Timestamp),
}

/// Reconciles encounter observations.
pub struct ObservationReconciler;

impl ObservationReconciler {
    fn mode(ctx: &PhaseContext<'_>) -> SyncResult<Mode> {
        if !ctx.incremental_observations {
            return Ok(Mode::Full);
        }
        Ok(match ctx.state().watermark()? {
            Some(since) => Mode::Incremental(since),
            None => Mode::Full,
        })
    }

    fn fetch(ctx: &PhaseContext<'_>, mode: Mode) -> SyncResult<PatientRecordResponse> {
        ctx.checkpoint("before fetching observations")?;
        let timeout = ctx.observations_timeout();
        match mode {
            Mode::Full => ctx.remote.fetch_all_encounters(timeout),
            Mode::Incremental(since) => ctx.remote.fetch_encounters_since(since, timeout),
        }
    }

    fn purge_temporary(ctx: &PhaseContext<'_>, counts: &mut DomainCounts) -> SyncResult<()> {
        ctx.checkpoint("before deleting temporary observations")?;
        let purged = ctx.store.delete(Domain::Observations, &Filter::Temporary)?;
        if purged > 0 {
            debug!(purged, "deleted temporary observations");
        }
        counts.deleted += purged as u64;
        Ok(())
    }
}

impl Reconciler for ObservationReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Observations
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let mut counts = DomainCounts::default();
        if ctx.store.count(Domain::Patients, &Filter::All)? == 0 {
            // Temporaries are purged on this path too; none may survive a successful phase.
            info!("no patients stored; skipping observation fetch");
            Self::purge_temporary(ctx, &mut counts)?;
            return Ok(counts);
        }

        let mode = Self::mode(ctx)?;
        info!(?mode, "fetching observations");
        let response = Self::fetch(ctx, mode)?;

        let mut patients = BTreeSet::new();
        let mut inserts = Vec::new();
        for record in &response.results {
            let Some(patient_uuid) = record.uuid.as_deref() else {
                warn!(
                    encounters = record.encounters.len(),
                    "skipping encounters without patient uuid"
                );
                counts.errors += 1;
                continue;
            };
            patients.insert(patient_uuid.to_string());
            inserts.extend(record.observations().into_iter().map(Record::from));
        }

        if mode == Mode::Full && !patients.is_empty() {
            ctx.checkpoint("before deleting replaced observations")?;
            let deleted = ctx
                .store
                .delete(Domain::Observations, &Filter::Patients(patients))?;
            counts.deleted += deleted as u64;
        }

        ctx.checkpoint("before inserting observations")?;
        counts.inserted = ctx.store.bulk_insert(Domain::Observations, inserts)? as u64;

        match response.snapshot_time {
            Some(snapshot) => ctx.state().set_watermark(snapshot)?,
            None => warn!("encounter response carried no snapshot time; watermark unchanged"),
        }

        Self::purge_temporary(ctx, &mut counts)?;
        info!(
            inserted = counts.inserted,
            deleted = counts.deleted,
            skipped = counts.errors,
            "observations synced"
        );
        Ok(counts)
    }
}
