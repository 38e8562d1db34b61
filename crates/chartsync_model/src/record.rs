//! Locally cached records.

use crate::domain::Domain;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user (provider) known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned identifier.
    pub uuid: String,
    /// Display name.
    pub full_name: String,
}

/// A location, possibly nested under a parent location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Server-assigned identifier.
    pub uuid: String,
    /// Enclosing location, if any.
    pub parent_uuid: Option<String>,
    /// Display names keyed by locale.
    pub names: BTreeMap<String, String>,
}

/// One row of a flattened chart layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartItem {
    /// Chart this row belongs to.
    pub chart_uuid: String,
    /// Position of the row within the whole chart.
    pub weight: u32,
    /// Label of the enclosing section.
    pub section_label: String,
    /// Kind of the enclosing section (tile row, grid, ...).
    pub section_type: Option<String>,
    /// Row label.
    pub label: String,
    /// Rendering type of the row.
    pub item_type: Option<String>,
    /// Concepts shown in this row.
    pub concept_uuids: Vec<String>,
    /// Value format string.
    pub format: Option<String>,
    /// Whether the row must always be shown.
    pub required: bool,
}

impl ChartItem {
    /// Identity key of a chart row.
    pub fn key_for(chart_uuid: &str, weight: u32) -> String {
        format!("{chart_uuid}/{weight}")
    }
}

/// How the values of a concept are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConceptType {
    /// Numeric value.
    Numeric,
    /// Free text.
    Text,
    /// Value is itself a concept uuid.
    Coded,
    /// Date and time.
    Datetime,
    /// Calendar date.
    Date,
    /// Yes/no.
    Boolean,
    /// No value, the concept is a question group or similar.
    None,
    /// A type this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl ConceptType {
    /// Returns the stored name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptType::Numeric => "NUMERIC",
            ConceptType::Text => "TEXT",
            ConceptType::Coded => "CODED",
            ConceptType::Datetime => "DATETIME",
            ConceptType::Date => "DATE",
            ConceptType::Boolean => "BOOLEAN",
            ConceptType::None => "NONE",
            ConceptType::Unknown => "UNKNOWN",
        }
    }
}

/// A concept: the question or answer that observations refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Server-assigned identifier.
    pub uuid: String,
    /// Numeric id used by form definitions.
    pub xform_id: Option<i64>,
    /// Value interpretation.
    pub concept_type: ConceptType,
    /// Display names keyed by locale.
    pub names: BTreeMap<String, String>,
}

/// A patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    /// Server-assigned identifier.
    pub uuid: String,
    /// Human-facing medical record number.
    pub id: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Family name.
    pub family_name: Option<String>,
    /// Sex, as reported by the server.
    pub sex: Option<String>,
    /// Birthdate in ISO-8601 calendar form.
    pub birthdate: Option<String>,
    /// Currently assigned location.
    pub location_uuid: Option<String>,
}

/// A single observed value recorded in an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Patient the observation belongs to.
    pub patient_uuid: String,
    /// Encounter that recorded it.
    pub encounter_uuid: String,
    /// When the encounter happened.
    pub encounter_time: Timestamp,
    /// Question concept.
    pub concept_uuid: String,
    /// Raw value, interpreted per the concept's type.
    pub value: String,
    /// Written speculatively on the device; superseded by server data.
    pub temporary: bool,
}

impl Observation {
    /// Creates a speculative observation for a locally submitted encounter.
    ///
    /// The encounter gets a fresh local identifier, so the record never
    /// collides with server data and is purged by the next observation sync.
    pub fn temporary(
        patient_uuid: impl Into<String>,
        concept_uuid: impl Into<String>,
        value: impl Into<String>,
        encounter_time: Timestamp,
    ) -> Self {
        Self {
            patient_uuid: patient_uuid.into(),
            encounter_uuid: format!("local-{}", uuid::Uuid::new_v4()),
            encounter_time,
            concept_uuid: concept_uuid.into(),
            value: value.into(),
            temporary: true,
        }
    }

    /// Identity key of an observation.
    pub fn key_for(encounter_uuid: &str, concept_uuid: &str) -> String {
        format!("{encounter_uuid}/{concept_uuid}")
    }
}

/// A treatment order for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Server-assigned identifier.
    pub uuid: String,
    /// Patient the order is for.
    pub patient_uuid: String,
    /// Free-text instructions.
    pub instructions: String,
    /// When the order takes effect.
    pub start: Timestamp,
    /// When the order ends, if bounded.
    pub stop: Option<Timestamp>,
}

/// A data-entry form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Server-assigned identifier.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Server version tag; a change means the form must be refetched.
    pub version: String,
}

/// A named integer value kept by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscEntry {
    /// Entry name.
    pub name: String,
    /// Stored value.
    pub value: i64,
}

/// Any locally stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// A user.
    User(User),
    /// A location.
    Location(Location),
    /// A chart layout row.
    ChartItem(ChartItem),
    /// A concept.
    Concept(Concept),
    /// A patient.
    Patient(Patient),
    /// An observation.
    Observation(Observation),
    /// An order.
    Order(Order),
    /// A form.
    Form(Form),
    /// An engine bookkeeping value.
    Misc(MiscEntry),
}

impl Record {
    /// Returns the domain this record is stored in.
    pub fn domain(&self) -> Domain {
        match self {
            Record::User(_) => Domain::Users,
            Record::Location(_) => Domain::Locations,
            Record::ChartItem(_) => Domain::ChartItems,
            Record::Concept(_) => Domain::Concepts,
            Record::Patient(_) => Domain::Patients,
            Record::Observation(_) => Domain::Observations,
            Record::Order(_) => Domain::Orders,
            Record::Form(_) => Domain::Forms,
            Record::Misc(_) => Domain::Misc,
        }
    }

    /// Returns the identity key of this record within its domain.
    pub fn key(&self) -> String {
        match self {
            Record::User(u) => u.uuid.clone(),
            Record::Location(l) => l.uuid.clone(),
            Record::ChartItem(c) => ChartItem::key_for(&c.chart_uuid, c.weight),
            Record::Concept(c) => c.uuid.clone(),
            Record::Patient(p) => p.uuid.clone(),
            Record::Observation(o) => Observation::key_for(&o.encounter_uuid, &o.concept_uuid),
            Record::Order(o) => o.uuid.clone(),
            Record::Form(f) => f.uuid.clone(),
            Record::Misc(m) => m.name.clone(),
        }
    }

    /// Returns the patient this record belongs to, for patient-scoped domains.
    pub fn patient_uuid(&self) -> Option<&str> {
        match self {
            Record::Patient(p) => Some(&p.uuid),
            Record::Observation(o) => Some(&o.patient_uuid),
            Record::Order(o) => Some(&o.patient_uuid),
            _ => None,
        }
    }

    /// Returns true for speculative local writes.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Record::Observation(o) if o.temporary)
    }
}

macro_rules! impl_from_record {
    ($($ty:ident),*) => {
        $(impl From<$ty> for Record {
            fn from(value: $ty) -> Self {
                Record::$ty(value)
            }
        })*
    };
}

impl_from_record!(User, Location, ChartItem, Concept, Patient, Observation, Order, Form);

impl From<MiscEntry> for Record {
    fn from(value: MiscEntry) -> Self {
        Record::Misc(value)
    }
}
