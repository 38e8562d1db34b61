//! Patients: insert new, update changed, never delete.

use super::{apply, diff, PhaseContext, Reconciler};
use crate::error::SyncResult;
use crate::phase::SyncPhase;
use crate::stats::DomainCounts;
use chartsync_model::{Domain, Record};
use tracing::{info, warn};

/// Merges the server's patient list into the local one.
///
/// Patients missing from the response are kept: they may have been
/// created on this device and not yet be visible to the server.
pub struct PatientReconciler;

impl Reconciler for PatientReconciler {
    fn phase(&self) -> SyncPhase {
        SyncPhase::Patients
    }

    fn reconcile(&self, ctx: &PhaseContext<'_>) -> SyncResult<DomainCounts> {
        let patients = ctx.remote.fetch_patients(ctx.fetch_timeout())?;
        let mut counts = DomainCounts::default();
        let mut incoming = Vec::with_capacity(patients.len());
        for patient in patients {
            match patient.into_record() {
                Some(patient) => incoming.push(Record::from(patient)),
                None => {
                    warn!("skipping patient without uuid");
                    counts.errors += 1;
                }
            }
        }

        let operations = diff(ctx, Domain::Patients, incoming, false, &mut counts)?;
        apply(ctx, self.phase(), operations)?;
        info!(
            inserted = counts.inserted,
            updated = counts.updated,
            "patients synced"
        );
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use chartsync_model::wire::WirePatient;
    use chartsync_model::Patient;
    use chartsync_store::{Filter, LocalStore};

    fn wire(uuid: Option<&str>, given: &str) -> WirePatient {
        WirePatient {
            uuid: uuid.map(String::from),
            id: None,
            given_name: Some(given.into()),
            family_name: None,
            sex: None,
            birthdate: None,
            assigned_location_uuid: None,
        }
    }

    #[test]
    fn merges_without_deleting() {
        let h = Harness::new();
        h.store
            .bulk_insert(
                Domain::Patients,
                vec![Record::from(Patient {
                    uuid: "local".into(),
                    id: None,
                    given_name: None,
                    family_name: None,
                    sex: None,
                    birthdate: None,
                    location_uuid: None,
                })],
            )
            .unwrap();
        h.remote.set_patients(vec![wire(Some("p1"), "Ada"), wire(None, "ghost")]);
        let counts = h.run(&PatientReconciler).unwrap();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.deleted, 0);
        assert_eq!(counts.errors, 1);
        assert_eq!(h.keys(Domain::Patients), vec!["local", "p1"]);
    }

    #[test]
    fn changed_patients_are_updated() {
        let h = Harness::new();
        h.remote.set_patients(vec![wire(Some("p1"), "Ada")]);
        h.run(&PatientReconciler).unwrap();
        h.remote.set_patients(vec![wire(Some("p1"), "Grace")]);
        let counts = h.run(&PatientReconciler).unwrap();
        assert_eq!(counts.updated, 1);
        let stored = h.store.query(Domain::Patients, &Filter::Key("p1".into())).unwrap();
        assert!(matches!(&stored[0], Record::Patient(p) if p.given_name.as_deref() == Some("Grace")));
    }
}
