//! Property-based test generators using proptest.

use crate::fixtures::{
    observation, patient, temporary_observation, user, wire_form, wire_order, wire_patient,
    wire_user, ClinicData,
};
use chartsync_model::wire::{PatientRecord, PatientRecordResponse, WireEncounter};
use chartsync_model::{Record, Timestamp};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for short identifiers drawn from a small space, so that
/// generated data overlaps with stored data.
pub fn id_strategy(prefix: &'static str) -> impl Strategy<Value = String> {
    (0u8..8).prop_map(move |n| format!("{prefix}{n}"))
}

/// Strategy for observation values.
pub fn value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9]{1,3}(\\.[0-9])?").expect("Invalid regex")
}

/// Strategy for one encounter of a patient.
pub fn encounter_strategy() -> impl Strategy<Value = WireEncounter> {
    (
        id_strategy("e"),
        0i64..100_000,
        prop::collection::btree_map(id_strategy("c"), value_strategy(), 0..4),
    )
        .prop_map(|(uuid, at, observations)| WireEncounter {
            uuid,
            timestamp: Timestamp::from_millis(at),
            observations,
        })
}

/// Strategy for a patient record, occasionally lacking its patient uuid.
pub fn patient_record_strategy() -> impl Strategy<Value = PatientRecord> {
    (
        prop::option::weighted(0.9, id_strategy("p")),
        prop::collection::vec(encounter_strategy(), 0..3),
    )
        .prop_map(|(uuid, encounters)| {
            // Encounter uuids are unique per server; scope them to the patient.
            let prefix = uuid.clone().unwrap_or_default();
            let encounters = encounters
                .into_iter()
                .map(|mut e| {
                    e.uuid = format!("{prefix}-{}", e.uuid);
                    e
                })
                .collect();
            PatientRecord { uuid, encounters }
        })
}

/// Strategy for an encounter response.
pub fn encounter_response_strategy() -> impl Strategy<Value = PatientRecordResponse> {
    (
        prop::collection::vec(patient_record_strategy(), 0..5),
        prop::option::of(100_000i64..200_000),
    )
        .prop_map(|(results, snapshot)| PatientRecordResponse {
            results,
            snapshot_time: snapshot.map(Timestamp::from_millis),
        })
}

/// Strategy for server-side clinic data.
pub fn clinic_data_strategy() -> impl Strategy<Value = ClinicData> {
    (
        prop::collection::btree_set(id_strategy("u"), 0..4),
        prop::collection::btree_set(id_strategy("p"), 0..5),
        encounter_response_strategy(),
        prop::collection::btree_map(id_strategy("o"), id_strategy("p"), 0..4),
        prop::collection::btree_map(id_strategy("f"), 1u8..3, 0..3),
    )
        .prop_map(|(users, patients, encounters, orders, forms)| ClinicData {
            users: users.iter().map(|u| wire_user(u)).collect(),
            patients: patients.iter().map(|p| wire_patient(p)).collect(),
            encounters,
            orders: orders
                .iter()
                .map(|(o, p)| wire_order(o, p, "as needed"))
                .collect(),
            forms: forms
                .iter()
                .map(|(f, v)| wire_form(f, &v.to_string()))
                .collect(),
            ..ClinicData::default()
        })
}

/// Strategy for the content of a local store before a sync.
///
/// Includes temporary observations, which a successful observation phase
/// must remove.
pub fn local_records_strategy() -> impl Strategy<Value = Vec<Record>> {
    (
        prop::collection::btree_set(id_strategy("u"), 0..4),
        prop::collection::btree_set(id_strategy("p"), 0..5),
        prop::collection::vec(
            (id_strategy("p"), id_strategy("e"), id_strategy("c"), value_strategy()),
            0..6,
        ),
        prop::collection::vec((id_strategy("p"), id_strategy("c")), 0..3),
    )
        .prop_map(|(users, patients, observations, temporaries)| {
            let mut records: Vec<Record> = users.iter().map(|u| user(u)).collect();
            records.extend(patients.iter().map(|p| patient(p)));
            let mut seen = BTreeMap::new();
            for (p, e, c, v) in observations {
                let encounter = format!("{p}-{e}");
                seen.insert((encounter.clone(), c.clone()), observation(&p, &encounter, &c, &v));
            }
            records.extend(seen.into_values());
            records.extend(temporaries.iter().map(|(p, c)| temporary_observation(p, c, "1")));
            records
        })
}
