//! Payloads returned by the remote server.
//!
//! Wire types mirror the server's JSON and keep identity fields nullable.
//! Conversion into local records reports degenerate entries instead of
//! failing, so a single bad record never aborts a sync.

use crate::record::{ChartItem, Concept, ConceptType, Form, Location, Observation, Order, Patient, User};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `{"results": [...]}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultList<T> {
    /// The listed items.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> ResultList<T> {
    /// Wraps items in an envelope.
    pub fn new(results: Vec<T>) -> Self {
        Self { results }
    }
}

/// A user as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireUser {
    /// Identifier; absent on degenerate entries.
    #[serde(alias = "user_id")]
    pub uuid: Option<String>,
    /// Display name.
    #[serde(default)]
    pub full_name: String,
}

impl WireUser {
    /// Converts to a local record, or `None` without an identifier.
    pub fn into_record(self) -> Option<User> {
        Some(User {
            uuid: self.uuid?,
            full_name: self.full_name,
        })
    }
}

/// A location as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLocation {
    /// Identifier; absent on degenerate entries.
    pub uuid: Option<String>,
    /// Enclosing location.
    #[serde(default)]
    pub parent_uuid: Option<String>,
    /// Names keyed by locale; individual names may be null.
    #[serde(default)]
    pub names: BTreeMap<String, Option<String>>,
}

/// Outcome of converting one wire entry that may carry degenerate parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted<T> {
    /// The converted record.
    pub record: T,
    /// Number of sub-entries dropped because they were incomplete.
    pub skipped: usize,
}

/// Keeps names with a non-empty locale and a present value.
fn clean_names(names: BTreeMap<String, Option<String>>) -> (BTreeMap<String, String>, usize) {
    let total = names.len();
    let kept: BTreeMap<String, String> = names
        .into_iter()
        .filter(|(locale, _)| !locale.is_empty())
        .filter_map(|(locale, name)| name.map(|name| (locale, name)))
        .collect();
    let skipped = total - kept.len();
    (kept, skipped)
}

impl WireLocation {
    /// Converts to a local record, or `None` without an identifier.
    pub fn into_record(self) -> Option<Converted<Location>> {
        let uuid = self.uuid?;
        let (names, skipped) = clean_names(self.names);
        Some(Converted {
            record: Location {
                uuid,
                parent_uuid: self.parent_uuid,
                names,
            },
            skipped,
        })
    }
}

/// A chart definition: ordered sections of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLayout {
    /// Chart identifier.
    pub uuid: String,
    /// Sections in display order.
    #[serde(default)]
    pub sections: Vec<ChartSection>,
}

/// One section of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSection {
    /// Section label.
    #[serde(default)]
    pub label: String,
    /// Section kind.
    #[serde(default)]
    pub section_type: Option<String>,
    /// Rows in display order.
    #[serde(default)]
    pub items: Vec<WireChartItem>,
}

/// One row of a chart section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChartItem {
    /// Row label.
    #[serde(default)]
    pub label: String,
    /// Rendering type.
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    /// Concepts shown in the row.
    #[serde(default)]
    pub concept_uuids: Vec<String>,
    /// Value format.
    #[serde(default)]
    pub format: Option<String>,
    /// Whether the row is always shown.
    #[serde(default)]
    pub required: bool,
}

impl ChartLayout {
    /// Flattens the layout into weighted rows.
    pub fn into_items(self) -> Vec<ChartItem> {
        let chart_uuid = self.uuid;
        let mut weight = 0u32;
        let mut rows = Vec::new();
        for section in self.sections {
            for item in section.items {
                weight += 1;
                rows.push(ChartItem {
                    chart_uuid: chart_uuid.clone(),
                    weight,
                    section_label: section.label.clone(),
                    section_type: section.section_type.clone(),
                    label: item.label,
                    item_type: item.item_type,
                    concept_uuids: item.concept_uuids,
                    format: item.format,
                    required: item.required,
                });
            }
        }
        rows
    }
}

/// A concept as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireConcept {
    /// Identifier; absent on degenerate entries.
    pub uuid: Option<String>,
    /// Form-definition id.
    #[serde(default)]
    pub xform_id: Option<i64>,
    /// Value interpretation.
    #[serde(rename = "type")]
    pub concept_type: ConceptType,
    /// Names keyed by locale; individual names may be null.
    #[serde(default)]
    pub names: BTreeMap<String, Option<String>>,
}

impl WireConcept {
    /// Converts to a local record, or `None` without an identifier.
    pub fn into_record(self) -> Option<Converted<Concept>> {
        let uuid = self.uuid?;
        let (names, skipped) = clean_names(self.names);
        Some(Converted {
            record: Concept {
                uuid,
                xform_id: self.xform_id,
                concept_type: self.concept_type,
                names,
            },
            skipped,
        })
    }
}

/// A patient as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePatient {
    /// Identifier; absent on degenerate entries.
    pub uuid: Option<String>,
    /// Medical record number.
    #[serde(default)]
    pub id: Option<String>,
    /// Given name.
    #[serde(default)]
    pub given_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub family_name: Option<String>,
    /// Sex.
    #[serde(default)]
    pub sex: Option<String>,
    /// ISO-8601 birthdate.
    #[serde(default)]
    pub birthdate: Option<String>,
    /// Assigned location.
    #[serde(default)]
    pub assigned_location_uuid: Option<String>,
}

impl WirePatient {
    /// Converts to a local record, or `None` without an identifier.
    pub fn into_record(self) -> Option<Patient> {
        Some(Patient {
            uuid: self.uuid?,
            id: self.id,
            given_name: self.given_name,
            family_name: self.family_name,
            sex: self.sex,
            birthdate: self.birthdate,
            location_uuid: self.assigned_location_uuid,
        })
    }
}

/// Encounters for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Patient identifier; absent on degenerate entries.
    pub uuid: Option<String>,
    /// Encounters recorded for the patient.
    #[serde(default)]
    pub encounters: Vec<WireEncounter>,
}

/// One encounter: a set of concept → value observations taken together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEncounter {
    /// Encounter identifier.
    pub uuid: String,
    /// When the encounter happened.
    pub timestamp: Timestamp,
    /// Observed values keyed by concept uuid.
    #[serde(default)]
    pub observations: BTreeMap<String, String>,
}

impl PatientRecord {
    /// Expands the encounters into authoritative observations.
    ///
    /// Returns an empty list when the patient identifier is missing.
    pub fn observations(&self) -> Vec<Observation> {
        let Some(patient_uuid) = self.uuid.as_deref() else {
            return Vec::new();
        };
        self.encounters
            .iter()
            .flat_map(|encounter| {
                encounter
                    .observations
                    .iter()
                    .map(move |(concept_uuid, value)| Observation {
                        patient_uuid: patient_uuid.to_string(),
                        encounter_uuid: encounter.uuid.clone(),
                        encounter_time: encounter.timestamp,
                        concept_uuid: concept_uuid.clone(),
                        value: value.clone(),
                        temporary: false,
                    })
            })
            .collect()
    }
}

/// Response to an encounter fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecordResponse {
    /// Encounters grouped by patient.
    #[serde(default)]
    pub results: Vec<PatientRecord>,
    /// Server time the response reflects; the next incremental fetch starts here.
    #[serde(default)]
    pub snapshot_time: Option<Timestamp>,
}

/// An order as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOrder {
    /// Identifier; absent on degenerate entries.
    pub uuid: Option<String>,
    /// Patient identifier; absent on degenerate entries.
    pub patient_uuid: Option<String>,
    /// Instructions.
    #[serde(default)]
    pub instructions: String,
    /// Start time.
    pub start_millis: Timestamp,
    /// Stop time.
    #[serde(default)]
    pub stop_millis: Option<Timestamp>,
}

impl WireOrder {
    /// Converts to a local record, or `None` without identifiers.
    pub fn into_record(self) -> Option<Order> {
        Some(Order {
            uuid: self.uuid?,
            patient_uuid: self.patient_uuid?,
            instructions: self.instructions,
            start: self.start_millis,
            stop: self.stop_millis,
        })
    }
}

/// A form as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireForm {
    /// Identifier; absent on degenerate entries.
    pub uuid: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Version tag.
    #[serde(default)]
    pub version: String,
}

impl WireForm {
    /// Converts to a local record, or `None` without an identifier.
    pub fn into_record(self) -> Option<Form> {
        Some(Form {
            uuid: self.uuid?,
            name: self.name,
            version: self.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_record_expands_encounters() {
        let record: PatientRecord = serde_json::from_str(
            r#"{"uuid":"p1","encounters":[
                {"uuid":"e1","timestamp":100,"observations":{"c1":"a","c2":"b"}},
                {"uuid":"e2","timestamp":200,"observations":{"c1":"c"}}
            ]}"#,
        )
        .unwrap();
        let obs = record.observations();
        assert_eq!(obs.len(), 3);
        assert!(obs.iter().all(|o| o.patient_uuid == "p1" && !o.temporary));
        assert_eq!(obs[2].encounter_time, Timestamp::from_millis(200));
    }

    #[test]
    fn patient_record_without_uuid_yields_nothing() {
        let record: PatientRecord = serde_json::from_str(
            r#"{"uuid":null,"encounters":[{"uuid":"e1","timestamp":1,"observations":{"c":"v"}}]}"#,
        )
        .unwrap();
        assert!(record.observations().is_empty());
    }

    #[test]
    fn response_snapshot_time_is_optional() {
        let response: PatientRecordResponse = serde_json::from_str(r#"{"results":[]}"#).unwrap();
        assert_eq!(response.snapshot_time, None);
        let response: PatientRecordResponse =
            serde_json::from_str(r#"{"results":[],"snapshot_time":42}"#).unwrap();
        assert_eq!(response.snapshot_time, Some(Timestamp::from_millis(42)));
    }

    #[test]
    fn null_names_are_dropped_and_counted() {
        let concept: WireConcept = serde_json::from_str(
            r#"{"uuid":"c1","type":"CODED","names":{"en":"Fever","fr":null,"":"x"}}"#,
        )
        .unwrap();
        let converted = concept.into_record().unwrap();
        assert_eq!(converted.skipped, 2);
        assert_eq!(converted.record.names.len(), 1);
        assert_eq!(converted.record.names["en"], "Fever");
    }

    #[test]
    fn chart_layout_flattens_with_running_weight() {
        let layout = ChartLayout {
            uuid: "chart".into(),
            sections: vec![
                ChartSection {
                    label: "Vitals".into(),
                    section_type: Some("TILE_ROW".into()),
                    items: vec![
                        WireChartItem {
                            label: "Temp".into(),
                            item_type: None,
                            concept_uuids: vec!["c1".into()],
                            format: None,
                            required: true,
                        },
                        WireChartItem {
                            label: "Pulse".into(),
                            item_type: None,
                            concept_uuids: vec!["c2".into()],
                            format: None,
                            required: false,
                        },
                    ],
                },
                ChartSection {
                    label: "Symptoms".into(),
                    section_type: None,
                    items: vec![WireChartItem {
                        label: "Cough".into(),
                        item_type: None,
                        concept_uuids: vec!["c3".into()],
                        format: None,
                        required: false,
                    }],
                },
            ],
        };
        let rows = layout.into_items();
        let weights: Vec<u32> = rows.iter().map(|r| r.weight).collect();
        assert_eq!(weights, vec![1, 2, 3]);
        assert_eq!(rows[2].section_label, "Symptoms");
    }

    #[test]
    fn orders_require_both_identifiers() {
        let order = WireOrder {
            uuid: Some("o1".into()),
            patient_uuid: None,
            instructions: "rest".into(),
            start_millis: Timestamp::from_millis(1),
            stop_millis: None,
        };
        assert!(order.into_record().is_none());
    }
}
