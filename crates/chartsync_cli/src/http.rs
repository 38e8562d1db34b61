//! reqwest-backed HTTP client.

use chartsync_engine::{HttpClient, HttpFailure};
use std::time::Duration;

/// Longest error body kept in a failure.
const MAX_BODY: usize = 512;

/// Blocking HTTP client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with a descriptive user agent.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("chartsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, HttpFailure> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .map_err(map_error)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_BODY {
                let mut end = MAX_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(HttpFailure::Status {
                code: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().map_err(map_error)?;
        Ok(bytes.to_vec())
    }
}

fn map_error(error: reqwest::Error) -> HttpFailure {
    if error.is_timeout() {
        HttpFailure::Timeout
    } else {
        HttpFailure::Transport(error.to_string())
    }
}
