//! Route-based REST client core with request signing.
//!
//! # Overview
//! A client is built from a configuration document naming an endpoint,
//! signing credentials and a table of routes. Callers address routes by
//! name; the client signs the request when the route requires it,
//! substitutes path parameters, sends it, and reports the outcome through a
//! success or an error callback.
//!
//! # Design
//! - `RestClient` builds `HttpRequest` values and interprets `HttpResponse`
//!   values without touching the network (host-does-IO pattern).
//! - `Dispatcher` pairs a client with a `Transport` and owns the callback
//!   contract: exactly one callback per call, blocking or background as the
//!   route says.
//! - Configuration and route lookup errors are returned synchronously;
//!   request failures go to the error callback.
//! - Everything is read-only after construction, so clients are shared
//!   across threads without locks.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod interpret;
pub mod path;
pub mod routes;
pub mod signer;
pub mod transport;

pub use client::RestClient;
pub use config::{ClientConfig, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use dispatch::{Dispatch, Dispatcher, PendingRequest, RequestBuilder};
pub use error::{ApiError, ConfigError, RouteNotFound, TransportError};
pub use http::{FormFields, HttpMethod, HttpRequest, HttpResponse, ResponseRecord};
pub use interpret::interpret;
pub use path::{escape, resolve_path};
pub use routes::{Execution, RouteSpec, RouteTable, Signing};
pub use signer::{sign_at, DeviceId, Signature, Signer, TickClock};
pub use transport::{Transport, UreqTransport};
