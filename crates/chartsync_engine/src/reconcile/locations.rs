//! Locations: full replace every run.

use super::{apply, diff, PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use tracing::{info, warn};

/// Replaces the local location tree with the server's.
///
/// Names with an empty locale or a null value are dropped and counted as
/// errors; the location itself is kept.
pub struct LocationReconciler;

impl Reconciler for LocationReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Locations
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let locations = ctx.remote.fetch_locations(ctx.fetch_timeout())?;
        let mut counts = DomainCounts::default();
        let mut incoming = Vec::with_capacity(locations.len());
        for location in locations {
            match location.into_record() {
                Some(converted) => {
                    if converted.skipped > 0 {
                        warn!(
                            location = %converted.record.uuid,
                            skipped = converted.skipped,
                            "skipping location names with null locale or name"
                        );
                        counts.errors += converted.skipped as u64;
                    }
                    incoming.push(Record::from(converted.record));
                }
                None => {
                    warn!("skipping location without uuid");
                    counts.errors += 1;
                }
            }
        }

        let operations = diff(ctx, Domain::Locations, incoming, true, &mut counts)?;
        apply(ctx, self.phase(), operations)?;
        info!(
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            "locations synced"
        );
        Ok(counts)
    }
}
