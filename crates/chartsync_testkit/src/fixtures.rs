//! Test fixtures and store helpers.
//!
//! Builders for local records and wire payloads, plus a small clinic data
//! set that exercises every domain.

use chartsync_model::wire::{
    ChartLayout, ChartSection, PatientRecord, PatientRecordResponse, WireChartItem, WireConcept,
    WireEncounter, WireForm, WireLocation, WireOrder, WirePatient, WireUser,
};
use chartsync_model::{
    ConceptType, Domain, Observation, Patient, Record, Timestamp, User,
};
use chartsync_store::{FileStore, Filter, LocalStore, MemoryStore, Tables};
use std::collections::BTreeMap;
use tempfile::TempDir;

/// A file store in a temporary directory, removed on drop.
pub struct TestFileStore {
    /// The store.
    pub store: FileStore,
    /// The temporary directory (kept alive to prevent cleanup).
    pub dir: TempDir,
}

impl TestFileStore {
    /// Creates an empty file store.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(dir.path()).expect("Failed to open file store");
        Self { store, dir }
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a memory store holding `records`.
pub fn seeded_store(records: &[Record]) -> MemoryStore {
    let store = MemoryStore::new();
    seed(&store, records);
    store
}

/// Inserts `records` into `store`, grouped by domain.
pub fn seed(store: &dyn LocalStore, records: &[Record]) {
    let mut by_domain: BTreeMap<Domain, Vec<Record>> = BTreeMap::new();
    for record in records {
        by_domain.entry(record.domain()).or_default().push(record.clone());
    }
    for (domain, records) in by_domain {
        store.bulk_insert(domain, records).expect("Failed to seed store");
    }
}

/// Returns the keys stored in a domain, in key order.
pub fn keys(store: &dyn LocalStore, domain: Domain) -> Vec<String> {
    store
        .query(domain, &Filter::All)
        .expect("Failed to query store")
        .iter()
        .map(Record::key)
        .collect()
}

/// Returns the keys present in `tables` for a domain.
pub fn table_keys(tables: &Tables, domain: Domain) -> Vec<String> {
    tables.records(domain).map(Record::key).collect()
}

/// Builds a local user record.
pub fn user(uuid: &str) -> Record {
    Record::from(User {
        uuid: uuid.to_string(),
        full_name: format!("User {uuid}"),
    })
}

/// Builds a local patient record.
pub fn patient(uuid: &str) -> Record {
    Record::from(Patient {
        uuid: uuid.to_string(),
        id: Some(format!("MRN-{uuid}")),
        given_name: Some("Given".into()),
        family_name: Some(uuid.to_uppercase()),
        sex: None,
        birthdate: None,
        location_uuid: None,
    })
}

/// Builds a confirmed local observation.
pub fn observation(patient: &str, encounter: &str, concept: &str, value: &str) -> Record {
    Record::from(Observation {
        patient_uuid: patient.to_string(),
        encounter_uuid: encounter.to_string(),
        encounter_time: Timestamp::from_millis(1_000),
        concept_uuid: concept.to_string(),
        value: value.to_string(),
        temporary: false,
    })
}

/// Builds a temporary local observation.
pub fn temporary_observation(patient: &str, concept: &str, value: &str) -> Record {
    Record::from(Observation::temporary(
        patient,
        concept,
        value,
        Timestamp::from_millis(2_000),
    ))
}

/// Builds a wire user.
pub fn wire_user(uuid: &str) -> WireUser {
    WireUser {
        uuid: Some(uuid.to_string()),
        full_name: format!("User {uuid}"),
    }
}

/// Builds a wire location with an English name.
pub fn wire_location(uuid: &str, parent: Option<&str>) -> WireLocation {
    WireLocation {
        uuid: Some(uuid.to_string()),
        parent_uuid: parent.map(String::from),
        names: BTreeMap::from([("en".to_string(), Some(format!("Location {uuid}")))]),
    }
}

/// Builds a wire concept with an English name.
pub fn wire_concept(uuid: &str, concept_type: ConceptType) -> WireConcept {
    WireConcept {
        uuid: Some(uuid.to_string()),
        xform_id: None,
        concept_type,
        names: BTreeMap::from([("en".to_string(), Some(uuid.to_string()))]),
    }
}

/// Builds a wire patient.
pub fn wire_patient(uuid: &str) -> WirePatient {
    WirePatient {
        uuid: Some(uuid.to_string()),
        id: Some(format!("MRN-{uuid}")),
        given_name: Some("Given".into()),
        family_name: Some(uuid.to_uppercase()),
        sex: None,
        birthdate: None,
        assigned_location_uuid: None,
    }
}

/// Builds a patient record with one encounter.
pub fn patient_record(
    patient: Option<&str>,
    encounter: &str,
    at: i64,
    observations: &[(&str, &str)],
) -> PatientRecord {
    PatientRecord {
        uuid: patient.map(String::from),
        encounters: vec![WireEncounter {
            uuid: encounter.to_string(),
            timestamp: Timestamp::from_millis(at),
            observations: observations
                .iter()
                .map(|(concept, value)| (concept.to_string(), value.to_string()))
                .collect(),
        }],
    }
}

/// Builds an encounter response.
pub fn encounters(results: Vec<PatientRecord>, snapshot_time: Option<i64>) -> PatientRecordResponse {
    PatientRecordResponse {
        results,
        snapshot_time: snapshot_time.map(Timestamp::from_millis),
    }
}

/// Builds a wire order.
pub fn wire_order(uuid: &str, patient: &str, instructions: &str) -> WireOrder {
    WireOrder {
        uuid: Some(uuid.to_string()),
        patient_uuid: Some(patient.to_string()),
        instructions: instructions.to_string(),
        start_millis: Timestamp::from_millis(1_000),
        stop_millis: None,
    }
}

/// Builds a wire form.
pub fn wire_form(uuid: &str, version: &str) -> WireForm {
    WireForm {
        uuid: Some(uuid.to_string()),
        name: format!("Form {uuid}"),
        version: version.to_string(),
    }
}

/// Builds a one-section chart layout.
pub fn chart_layout(uuid: &str, rows: &[&str]) -> ChartLayout {
    ChartLayout {
        uuid: uuid.to_string(),
        sections: vec![ChartSection {
            label: "Vital signs".into(),
            section_type: Some("TILE_ROW".into()),
            items: rows
                .iter()
                .map(|concept| WireChartItem {
                    label: concept.to_string(),
                    item_type: None,
                    concept_uuids: vec![concept.to_string()],
                    format: None,
                    required: false,
                })
                .collect(),
        }],
    }
}

/// Everything the server knows, in wire form.
#[derive(Debug, Clone, Default)]
pub struct ClinicData {
    /// User list.
    pub users: Vec<WireUser>,
    /// Location list.
    pub locations: Vec<WireLocation>,
    /// Chart layout.
    pub chart: Option<ChartLayout>,
    /// Concept list.
    pub concepts: Vec<WireConcept>,
    /// Patient list.
    pub patients: Vec<WirePatient>,
    /// Response to a full encounter fetch.
    pub encounters: PatientRecordResponse,
    /// Order list.
    pub orders: Vec<WireOrder>,
    /// Form list.
    pub forms: Vec<WireForm>,
}

impl ClinicData {
    /// A small clinic with data in every domain.
    pub fn sample(chart_uuid: &str) -> Self {
        Self {
            users: vec![wire_user("nurse"), wire_user("doctor")],
            locations: vec![wire_location("site", None), wire_location("ward", Some("site"))],
            chart: Some(chart_layout(chart_uuid, &["temperature", "pulse"])),
            concepts: vec![
                wire_concept("temperature", ConceptType::Numeric),
                wire_concept("pulse", ConceptType::Numeric),
                wire_concept("fever", ConceptType::Coded),
            ],
            patients: vec![wire_patient("p1"), wire_patient("p2")],
            encounters: encounters(
                vec![
                    patient_record(Some("p1"), "e1", 5_000, &[("temperature", "38.5")]),
                    patient_record(Some("p2"), "e2", 6_000, &[("pulse", "90")]),
                ],
                Some(10_000),
            ),
            orders: vec![wire_order("o1", "p1", "paracetamol 1g")],
            forms: vec![wire_form("intake", "1")],
        }
    }
}
