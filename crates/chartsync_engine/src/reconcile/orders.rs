//! Orders: diff against the server list, pruning absent orders.

use super::{apply, diff, PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use tracing::{info, warn};

/// Makes the local order list match the server's in one atomic batch.
pub struct OrderReconciler;

impl Reconciler for OrderReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Orders
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let orders = ctx.remote.fetch_orders(ctx.fetch_timeout())?;
        let mut counts = DomainCounts::default();
        let mut incoming = Vec::with_capacity(orders.len());
        for order in orders {
            match order.into_record() {
                Some(order) => incoming.push(Record::from(order)),
                None => {
                    warn!("skipping order without uuid or patient");
                    counts.errors += 1;
                }
            }
        }

        let operations = diff(ctx, Domain::Orders, incoming, true, &mut counts)?;
        apply(ctx, self.phase(), operations)?;
        info!(
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            "orders synced"
        );
        Ok(counts)
    }
}
