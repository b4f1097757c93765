//! Executing requests over the network.
//!
//! `Transport` is the seam between request construction and the wire. The
//! bundled `UreqTransport` is a blocking ureq agent; tests and hosts with
//! their own HTTP stack implement the trait directly.

use std::fmt;
use std::time::Duration;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends one request and returns the raw response.
///
/// Any HTTP status is a response, not an error: status interpretation
/// belongs to the client. Errors are for requests that produced no response.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a ureq agent.
///
/// GET and DELETE carry the form fields in the query string, POST and PUT
/// as an `application/x-www-form-urlencoded` body.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Redirects are not followed: a 3xx is handed back like any other
    /// non-200 status.
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let fields = request
            .fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()));

        let mut response = match request.method {
            HttpMethod::Get => self.agent.get(&request.url).query_pairs(fields).call(),
            HttpMethod::Delete => self.agent.delete(&request.url).query_pairs(fields).call(),
            HttpMethod::Post => self.agent.post(&request.url).send_form(fields),
            HttpMethod::Put => self.agent.put(&request.url).send_form(fields),
        }?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
