//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! client builds `HttpRequest` values and interprets `HttpResponse` values;
//! moving bytes across the wire is the job of a `Transport` (or of the host,
//! when the core is driven through the C ABI).
//!
//! All fields use owned types (`String`, `Vec`) so values can cross thread
//! and FFI boundaries without lifetime concerns.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::escape;

/// Ordered form fields attached to an outgoing request. Duplicate keys are
/// allowed and kept in insertion order.
pub type FormFields = Vec<(String, String)>;

/// HTTP method for a route. Persisted by its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully constructed request: method, absolute URL and form fields.
///
/// Built by `RestClient::build_request`. Signing fields (`signature`, `t`)
/// are already present when the route requires them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub fields: FormFields,
}

impl HttpRequest {
    /// Look up the first field with the given name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The fields as an `application/x-www-form-urlencoded` string.
    pub fn form_body(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key), escape(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A raw HTTP response as returned by the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// An interpreted, successful response: status 200 with a non-empty JSON
/// object body. Each call gets its own record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub status: u16,
    /// Response headers as `"Name: value"` lines, in transport order.
    pub headers: Vec<String>,
    pub body: Map<String, Value>,
}

impl ResponseRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}
