//! Chart layout: full replace every run.

use super::{PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use chartsync_store::{Filter, Operation};
use tracing::info;

/// Replaces the stored rows of the configured chart.
pub struct ChartReconciler;

impl Reconciler for ChartReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::ChartItems
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let chart_uuid = &ctx.config.chart_uuid;
        let layout = ctx.remote.fetch_chart(chart_uuid, ctx.fetch_timeout())?;
        let rows: Vec<Record> = layout.into_items().into_iter().map(Record::from).collect();

        let mut counts = DomainCounts::default();
        ctx.checkpoint("before deleting chart items")?;
        counts.deleted = ctx.store.delete(Domain::ChartItems, &Filter::All)? as u64;

        ctx.checkpoint("before inserting chart items")?;
        let operations: Vec<Operation> = rows.into_iter().map(Operation::Insert).collect();
        counts.inserted = operations.len() as u64;
        if !operations.is_empty() {
            ctx.store.apply_batch(operations)?;
        }
        info!(chart = %chart_uuid, rows = counts.inserted, "chart layout synced");
        Ok(counts)
    }
}
