//! Forms: diff against the server list, pruning absent forms.

use super::{apply, diff, PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use tracing::{info, warn};

/// Makes the local form list match the server's in one atomic batch.
///
/// A form whose version changed is updated, which tells readers to refetch
/// its definition.
pub struct FormReconciler;

impl Reconciler for FormReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Forms
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let forms = ctx.remote.fetch_forms(ctx.fetch_timeout())?;
        let mut counts = DomainCounts::default();
        let mut incoming = Vec::with_capacity(forms.len());
        for form in forms {
            match form.into_record() {
                Some(form) => incoming.push(Record::from(form)),
                None => {
                    warn!("skipping form without uuid");
                    counts.errors += 1;
                }
            }
        }

        let operations = diff(ctx, Domain::Forms, incoming, true, &mut counts)?;
        apply(ctx, self.phase(), operations)?;
        info!(
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            "forms synced"
        );
        Ok(counts)
    }
}
