//! Users: full replace every run.

use super::{apply, diff, PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use tracing::{info, warn};

/// Replaces the local user list with the server's.
pub struct UserReconciler;

impl Reconciler for UserReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Users
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let users = ctx.remote.fetch_users(ctx.fetch_timeout())?;
        let mut counts = DomainCounts::default();
        let mut incoming = Vec::with_capacity(users.len());
        for user in users {
            match user.into_record() {
                Some(user) => incoming.push(Record::from(user)),
                None => {
                    warn!("skipping user without uuid");
                    counts.errors += 1;
                }
            }
        }

        let operations = diff(ctx, Domain::Users, incoming, true, &mut counts)?;
        apply(ctx, self.phase(), operations)?;
        info!(
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            "users synced"
        );
        Ok(counts)
    }
}
