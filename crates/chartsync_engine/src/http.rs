//! HTTP remote client.
//!
//! The actual HTTP library sits behind [`HttpClient`], so the engine does
//! not depend on one. Responses are JSON.

use crate::error::{SyncError, SyncResult};
use crate::health::HealthState;
use crate::remote::RemoteClient;
use chartsync_model::wire::{
    ChartLayout, PatientRecordResponse, ResultList, WireConcept, WireForm, WireLocation,
    WireOrder, WirePatient, WireUser,
};
use chartsync_model::Timestamp;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Why an HTTP request produced no usable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The request did not complete in time.
    Timeout,
    /// The connection could not be made or was lost.
    Transport(String),
    /// The server answered with a non-success status.
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, possibly truncated.
        body: String,
    },
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpFailure::Timeout => f.write_str("timed out"),
            HttpFailure::Transport(message) => write!(f, "{message}"),
            HttpFailure::Status { code, body } => write!(f, "HTTP {code}: {body}"),
        }
    }
}

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, HttpFailure>;
}

/// [`RemoteClient`] speaking JSON over HTTP.
pub struct HttpRemoteClient<C: HttpClient> {
    /// Base URL of the server (e.g., "https://clinic.example.org/api").
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteClient<C> {
    /// Creates a client for `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the message of the last failed request.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Probes the server root and records the result in `health`.
    ///
    /// Only a timeout or transport failure marks the server unavailable; an
    /// error status still proves it is reachable.
    pub fn probe(&self, health: &HealthState, timeout: Duration) {
        match self.client.get(&self.base_url, timeout) {
            Ok(_) | Err(HttpFailure::Status { .. }) => health.mark_available(),
            Err(failure) => {
                warn!(url = %self.base_url, %failure, "health probe failed");
                health.mark_unavailable();
            }
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?timeout, "GET");
        let body = self.client.get(&url, timeout).map_err(|failure| {
            *self.last_error.write() = Some(failure.to_string());
            match failure {
                HttpFailure::Timeout => SyncError::timeout(format!("GET {path}"), timeout),
                HttpFailure::Transport(message) => SyncError::transport_retryable(message),
                HttpFailure::Status { code, body } if code >= 500 => {
                    SyncError::ServerError(format!("HTTP {code}: {body}"))
                }
                HttpFailure::Status { code, body } => {
                    SyncError::transport_fatal(format!("HTTP {code}: {body}"))
                }
            }
        })?;
        *self.last_error.write() = None;

        serde_json::from_slice(&body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode {path} response: {e}")))
    }

    fn get_list<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> SyncResult<Vec<T>> {
        let list: ResultList<T> = self.get_json(path, timeout)?;
        Ok(list.results)
    }
}

impl<C: HttpClient> RemoteClient for HttpRemoteClient<C> {
    fn fetch_users(&self, timeout: Duration) -> SyncResult<Vec<WireUser>> {
        self.get_list("/users", timeout)
    }

    fn fetch_locations(&self, timeout: Duration) -> SyncResult<Vec<WireLocation>> {
        self.get_list("/locations", timeout)
    }

    fn fetch_chart(&self, chart_uuid: &str, timeout: Duration) -> SyncResult<ChartLayout> {
        self.get_json(&format!("/charts/{chart_uuid}"), timeout)
    }

    fn fetch_concepts(&self, timeout: Duration) -> SyncResult<Vec<WireConcept>> {
        self.get_list("/concepts", timeout)
    }

    fn fetch_patients(&self, timeout: Duration) -> SyncResult<Vec<WirePatient>> {
        self.get_list("/patients", timeout)
    }

    fn fetch_all_encounters(&self, timeout: Duration) -> SyncResult<PatientRecordResponse> {
        self.get_json("/encounters", timeout)
    }

    fn fetch_encounters_since(
        &self,
        since: Timestamp,
        timeout: Duration,
    ) -> SyncResult<PatientRecordResponse> {
        self.get_json(&format!("/encounters?since={}", since.millis()), timeout)
    }

    fn fetch_orders(&self, timeout: Duration) -> SyncResult<Vec<WireOrder>> {
        self.get_list("/orders", timeout)
    }

    fn fetch_forms(&self, timeout: Duration) -> SyncResult<Vec<WireForm>> {
        self.get_list("/xforms", timeout)
    }
}
