//! Remote server boundary.

use crate::error::{SyncError, SyncResult};
use chartsync_model::wire::{
    ChartLayout, PatientRecordResponse, WireConcept, WireForm, WireLocation, WireOrder,
    WirePatient, WireUser,
};
use chartsync_model::Timestamp;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Fetches authoritative data from the server.
///
/// Every fetch must give up once `timeout` has elapsed and report
/// [`SyncError::Timeout`].
pub trait RemoteClient: Send + Sync {
    /// Fetches every user.
    fn fetch_users(&self, timeout: Duration) -> SyncResult<Vec<WireUser>>;

    /// Fetches every location.
    fn fetch_locations(&self, timeout: Duration) -> SyncResult<Vec<WireLocation>>;

    /// Fetches one chart layout.
    fn fetch_chart(&self, chart_uuid: &str, timeout: Duration) -> SyncResult<ChartLayout>;

    /// Fetches every concept.
    fn fetch_concepts(&self, timeout: Duration) -> SyncResult<Vec<WireConcept>>;

    /// Fetches every patient.
    fn fetch_patients(&self, timeout: Duration) -> SyncResult<Vec<WirePatient>>;

    /// Fetches the encounters of every patient in one request.
    fn fetch_all_encounters(&self, timeout: Duration) -> SyncResult<PatientRecordResponse>;

    /// Fetches encounters recorded after `since`.
    fn fetch_encounters_since(
        &self,
        since: Timestamp,
        timeout: Duration,
    ) -> SyncResult<PatientRecordResponse>;

    /// Fetches every order.
    fn fetch_orders(&self, timeout: Duration) -> SyncResult<Vec<WireOrder>>;

    /// Fetches every form definition.
    fn fetch_forms(&self, timeout: Duration) -> SyncResult<Vec<WireForm>>;
}

/// Remote endpoints, without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteEndpoint {
    /// User list.
    Users,
    /// Location list.
    Locations,
    /// Chart layout.
    Chart,
    /// Concept list.
    Concepts,
    /// Patient list.
    Patients,
    /// Encounters, full or incremental.
    Encounters,
    /// Order list.
    Orders,
    /// Form list.
    Forms,
}

/// A fetch made against a [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `fetch_users`.
    Users,
    /// `fetch_locations`.
    Locations,
    /// `fetch_chart`.
    Chart(String),
    /// `fetch_concepts`.
    Concepts,
    /// `fetch_patients`.
    Patients,
    /// `fetch_all_encounters`.
    AllEncounters,
    /// `fetch_encounters_since`.
    EncountersSince(Timestamp),
    /// `fetch_orders`.
    Orders,
    /// `fetch_forms`.
    Forms,
}

impl RemoteCall {
    /// Returns the endpoint this call hits.
    pub fn endpoint(&self) -> RemoteEndpoint {
        match self {
            RemoteCall::Users => RemoteEndpoint::Users,
            RemoteCall::Locations => RemoteEndpoint::Locations,
            RemoteCall::Chart(_) => RemoteEndpoint::Chart,
            RemoteCall::Concepts => RemoteEndpoint::Concepts,
            RemoteCall::Patients => RemoteEndpoint::Patients,
            RemoteCall::AllEncounters | RemoteCall::EncountersSince(_) => {
                RemoteEndpoint::Encounters
            }
            RemoteCall::Orders => RemoteEndpoint::Orders,
            RemoteCall::Forms => RemoteEndpoint::Forms,
        }
    }
}

/// A logged fetch with the timeout it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// The fetch.
    pub call: RemoteCall,
    /// The timeout passed by the caller.
    pub timeout: Duration,
}

/// A scripted fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// The fetch times out.
    Timeout,
    /// The connection drops.
    Transport,
    /// The response cannot be decoded.
    Malformed,
    /// The server answers with an error.
    Server,
}

impl MockFailure {
    fn to_error(self, call: &RemoteCall, timeout: Duration) -> SyncError {
        match self {
            MockFailure::Timeout => SyncError::timeout(format!("{call:?}"), timeout),
            MockFailure::Transport => SyncError::transport_retryable("connection reset"),
            MockFailure::Malformed => SyncError::Protocol(format!("malformed {call:?} response")),
            MockFailure::Server => SyncError::ServerError("internal server error".into()),
        }
    }
}

type CallHook = Box<dyn Fn(&RemoteCall) + Send + Sync>;

#[derive(Default)]
struct MockData {
    users: Vec<WireUser>,
    locations: Vec<WireLocation>,
    charts: HashMap<String, ChartLayout>,
    concepts: Vec<WireConcept>,
    patients: Vec<WirePatient>,
    all_encounters: PatientRecordResponse,
    encounters_since: PatientRecordResponse,
    orders: Vec<WireOrder>,
    forms: Vec<WireForm>,
    failures: HashMap<RemoteEndpoint, MockFailure>,
    calls: Vec<CallRecord>,
}

/// A scripted remote for testing.
///
/// Unscripted endpoints return empty data.
#[derive(Default)]
pub struct MockRemote {
    data: Mutex<MockData>,
    hook: Mutex<Option<CallHook>>,
}

impl fmt::Debug for MockRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRemote")
            .field("calls", &self.data.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl MockRemote {
    /// Creates a mock with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user list.
    pub fn set_users(&self, users: Vec<WireUser>) {
        self.data.lock().users = users;
    }

    /// Sets the location list.
    pub fn set_locations(&self, locations: Vec<WireLocation>) {
        self.data.lock().locations = locations;
    }

    /// Sets a chart layout, keyed by its uuid.
    pub fn set_chart(&self, chart: ChartLayout) {
        self.data.lock().charts.insert(chart.uuid.clone(), chart);
    }

    /// Sets the concept list.
    pub fn set_concepts(&self, concepts: Vec<WireConcept>) {
        self.data.lock().concepts = concepts;
    }

    /// Sets the patient list.
    pub fn set_patients(&self, patients: Vec<WirePatient>) {
        self.data.lock().patients = patients;
    }

    /// Sets the response to a full encounter fetch.
    pub fn set_all_encounters(&self, response: PatientRecordResponse) {
        self.data.lock().all_encounters = response;
    }

    /// Sets the response to an incremental encounter fetch.
    pub fn set_encounters_since(&self, response: PatientRecordResponse) {
        self.data.lock().encounters_since = response;
    }

    /// Sets the order list.
    pub fn set_orders(&self, orders: Vec<WireOrder>) {
        self.data.lock().orders = orders;
    }

    /// Sets the form list.
    pub fn set_forms(&self, forms: Vec<WireForm>) {
        self.data.lock().forms = forms;
    }

    /// Makes every call to `endpoint` fail until cleared.
    pub fn fail(&self, endpoint: RemoteEndpoint, failure: MockFailure) {
        self.data.lock().failures.insert(endpoint, failure);
    }

    /// Removes every scripted failure.
    pub fn clear_failures(&self) {
        self.data.lock().failures.clear();
    }

    /// Runs `hook` at the start of every fetch, before the response is built.
    pub fn on_call(&self, hook: impl Fn(&RemoteCall) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    /// Returns the fetches made so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.data.lock().calls.iter().map(|r| r.call.clone()).collect()
    }

    /// Returns the fetches made so far with their timeouts.
    pub fn call_records(&self) -> Vec<CallRecord> {
        self.data.lock().calls.clone()
    }

    /// Forgets the logged fetches.
    pub fn clear_calls(&self) {
        self.data.lock().calls.clear();
    }

    fn respond<T>(
        &self,
        call: RemoteCall,
        timeout: Duration,
        build: impl FnOnce(&MockData) -> T,
    ) -> SyncResult<T> {
        if let Some(hook) = self.hook.lock().as_ref() {
            hook(&call);
        }
        let mut data = self.data.lock();
        data.calls.push(CallRecord {
            call: call.clone(),
            timeout,
        });
        if let Some(failure) = data.failures.get(&call.endpoint()) {
            return Err(failure.to_error(&call, timeout));
        }
        Ok(build(&data))
    }
}

impl RemoteClient for MockRemote {
    fn fetch_users(&self, timeout: Duration) -> SyncResult<Vec<WireUser>> {
        self.respond(RemoteCall::Users, timeout, |d| d.users.clone())
    }

    fn fetch_locations(&self, timeout: Duration) -> SyncResult<Vec<WireLocation>> {
        self.respond(RemoteCall::Locations, timeout, |d| d.locations.clone())
    }

    fn fetch_chart(&self, chart_uuid: &str, timeout: Duration) -> SyncResult<ChartLayout> {
        self.respond(RemoteCall::Chart(chart_uuid.to_string()), timeout, |d| {
            d.charts.get(chart_uuid).cloned().unwrap_or_else(|| ChartLayout {
                uuid: chart_uuid.to_string(),
                sections: Vec::new(),
            })
        })
    }

    fn fetch_concepts(&self, timeout: Duration) -> SyncResult<Vec<WireConcept>> {
        self.respond(RemoteCall::Concepts, timeout, |d| d.concepts.clone())
    }

    fn fetch_patients(&self, timeout: Duration) -> SyncResult<Vec<WirePatient>> {
        self.respond(RemoteCall::Patients, timeout, |d| d.patients.clone())
    }

    fn fetch_all_encounters(&self, timeout: Duration) -> SyncResult<PatientRecordResponse> {
        self.respond(RemoteCall::AllEncounters, timeout, |d| {
            d.all_encounters.clone()
        })
    }

    fn fetch_encounters_since(
        &self,
        since: Timestamp,
        timeout: Duration,
    ) -> SyncResult<PatientRecordResponse> {
        self.respond(RemoteCall::EncountersSince(since), timeout, |d| {
            d.encounters_since.clone()
        })
    }

    fn fetch_orders(&self, timeout: Duration) -> SyncResult<Vec<WireOrder>> {
        self.respond(RemoteCall::Orders, timeout, |d| d.orders.clone())
    }

    fn fetch_forms(&self, timeout: Duration) -> SyncResult<Vec<WireForm>> {
        self.respond(RemoteCall::Forms, timeout, |d| d.forms.clone())
    }
}
