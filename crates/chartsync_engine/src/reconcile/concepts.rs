//! Concepts: upsert by replace.

use super::{PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use chartsync_store::Filter;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Concepts converted between cancellation checkpoints.
const CHECKPOINT_INTERVAL: usize = 100;

/// Inserts or replaces every concept the server lists. Concepts the server
/// no longer lists are kept, since stored observations may refer to them.
pub struct ConceptReconciler;

impl Reconciler for ConceptReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Concepts
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let concepts = ctx.remote.fetch_concepts(ctx.fetch_timeout())?;
        let mut counts = DomainCounts::default();
        let mut incoming = Vec::with_capacity(concepts.len());
        for (index, concept) in concepts.into_iter().enumerate() {
            if index % CHECKPOINT_INTERVAL == 0 {
                ctx.checkpoint("while processing concepts")?;
            }
            match concept.into_record() {
                Some(converted) => {
                    if converted.skipped > 0 {
                        warn!(
                            concept = %converted.record.uuid,
                            skipped = converted.skipped,
                            "skipping concept names with null locale or name"
                        );
                        counts.errors += converted.skipped as u64;
                    }
                    incoming.push(Record::from(converted.record));
                }
                None => {
                    warn!("skipping concept without uuid");
                    counts.errors += 1;
                }
            }
        }

        let existing: BTreeSet<String> = ctx
            .store
            .query(Domain::Concepts, &Filter::All)?
            .iter()
            .map(Record::key)
            .collect();
        let mut seen = BTreeSet::new();
        for record in &incoming {
            let key = record.key();
            if existing.contains(&key) {
                if seen.insert(key) {
                    counts.updated += 1;
                }
            } else if seen.insert(key) {
                counts.inserted += 1;
            }
        }

        ctx.checkpoint("before inserting concepts")?;
        ctx.store.bulk_insert(Domain::Concepts, incoming)?;
        ctx.concepts.invalidate();
        info!(
            inserted = counts.inserted,
            replaced = counts.updated,
            "concepts synced"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use chartsync_model::wire::WireConcept;
    use chartsync_model::ConceptType;
    use std::collections::BTreeMap;

    fn wire(uuid: &str, name: Option<&str>) -> WireConcept {
        WireConcept {
            uuid: Some(uuid.into()),
            xform_id: Some(1),
            concept_type: ConceptType::Numeric,
            names: BTreeMap::from([("en".to_string(), name.map(String::from))]),
        }
    }

    #[test]
    fn upserts_and_keeps_unlisted_concepts() {
        let h = Harness::new();
        h.remote.set_concepts(vec![wire("a", Some("A")), wire("b", Some("B"))]);
        assert_eq!(h.run(&ConceptReconciler).unwrap().inserted, 2);

        h.remote.set_concepts(vec![wire("b", Some("Bee")), wire("c", None)]);
        let counts = h.run(&ConceptReconciler).unwrap();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.errors, 1);
        assert_eq!(h.keys(Domain::Concepts), vec!["a", "b", "c"]);
    }

    #[test]
    fn invalidates_the_concept_cache() {
        let h = Harness::new();
        h.concepts.load(&h.store, "en").unwrap();
        assert!(h.concepts.is_loaded());
        h.remote.set_concepts(vec![wire("a", Some("A"))]);
        h.run(&ConceptReconciler).unwrap();
        assert!(!h.concepts.is_loaded());
        assert_eq!(h.concepts.load(&h.store, "en").unwrap().name("a"), Some("A"));
    }

    #[test]
    fn cancellation_while_processing_concepts() {
        let h = Harness::new();
        h.remote.set_concepts(vec![wire("a", Some("A"))]);
        h.cancel.cancel();
        assert!(h.run(&ConceptReconciler).is_err());
        assert!(h.keys(Domain::Concepts).is_empty());
    }
}
