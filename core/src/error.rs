//! Error types for the REST client.
//!
//! # Design
//! Errors are split by where they surface. `ConfigError` and `RouteNotFound`
//! are returned synchronously to the caller: they mean the code and the
//! configuration disagree. `TransportError` and `ApiError` describe a request
//! that was sent and failed; the dispatcher renders them to a message and
//! hands that to the error callback.

use std::path::PathBuf;

use thiserror::Error;

/// The persisted configuration could not be read, parsed or written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("invalid route at index {index}: {reason}")]
    InvalidRoute { index: usize, reason: String },

    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A dispatch named a route the table does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route not found: {name}")]
pub struct RouteNotFound {
    pub name: String,
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Refused, reset or unresolvable host.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("General error: timed out: {0}")]
    Timeout(String),

    #[error("General error: {0}")]
    Other(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match &err {
            ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
            ureq::Error::Io(_) | ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
                TransportError::Connection(err.to_string())
            }
            _ => TransportError::Other(err.to_string()),
        }
    }
}

/// The server answered, but not with a usable result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Any status other than 200.
    #[error("{status} Error: {body}")]
    Status { status: u16, body: String },

    /// Status 200 but the body is not a JSON object.
    #[error("{body}")]
    Undecodable { body: String },

    /// Status 200 and a JSON object with no entries.
    #[error("{body}")]
    EmptyBody { body: String },
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Status { status, .. } => *status,
            ApiError::Undecodable { .. } | ApiError::EmptyBody { .. } => 200,
        }
    }
}
