//! Request construction and response interpretation for named routes.
//!
//! # Design
//! `RestClient` holds the loaded configuration, the route table and a
//! signer. It never performs I/O: `build_request` produces an `HttpRequest`
//! and `interpret` consumes an `HttpResponse`. `Dispatcher` puts a transport
//! between the two; hosts with their own HTTP stack can call both halves
//! directly.
//!
//! Signing happens before path substitution and covers the route's path
//! template, not the filled-in path.

use tracing::debug;

use crate::config::{ClientConfig, ConfigStore};
use crate::error::{ApiError, ConfigError, RouteNotFound};
use crate::http::{FormFields, HttpRequest, HttpResponse, ResponseRecord};
use crate::interpret::interpret;
use crate::path::resolve_path;
use crate::routes::{RouteSpec, RouteTable, Signing};
use crate::signer::{DeviceId, Signer};

/// Builds signed, resolved requests for the routes in a configuration.
///
/// Read-only after construction; share it across threads behind an `Arc`.
#[derive(Debug)]
pub struct RestClient {
    endpoint: String,
    api_key: String,
    api_secret: String,
    debug: bool,
    routes: RouteTable,
    signer: Signer,
}

impl RestClient {
    pub fn new(config: ClientConfig, device_id: DeviceId) -> Self {
        let ClientConfig {
            endpoint,
            api_key,
            api_secret,
            debug,
            routes,
        } = config;
        let client = Self {
            endpoint,
            api_key,
            api_secret,
            debug,
            routes: RouteTable::from_routes(routes),
            signer: Signer::new(device_id),
        };

        if client.debug {
            debug!(endpoint = %client.endpoint, "rest client initialized");
            for route in client.routes.iter() {
                debug!("route {} -> {} {}", route.name, route.method, route.path);
            }
        }
        client
    }

    /// Load the configuration from `store` and build a client from it.
    pub fn from_store(store: &impl ConfigStore, device_id: DeviceId) -> Result<Self, ConfigError> {
        Ok(Self::new(store.load()?, device_id))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn route(&self, name: &str) -> Result<&RouteSpec, RouteNotFound> {
        self.routes.get(name)
    }

    pub fn device_id(&self) -> &DeviceId {
        self.signer.device_id()
    }

    /// Build the request for `route_name`.
    ///
    /// Fails only when the route does not exist. Signed routes get
    /// `signature` and `t` appended to `fields`, whatever the credentials
    /// hold; empty strings are signed like any other value.
    pub fn build_request(
        &self,
        route_name: &str,
        replacements: &[(&str, &str)],
        mut fields: FormFields,
    ) -> Result<HttpRequest, RouteNotFound> {
        let route = self.routes.get(route_name)?;

        if route.signing == Signing::Signed {
            let signature = self.signer.sign(&route.path, &self.api_key, &self.api_secret);
            if self.debug {
                debug!(route = %route.name, signature = %signature.value, "request signature");
            }
            fields.extend(signature.into_fields());
        }

        let path = resolve_path(&route.path, replacements);
        Ok(HttpRequest {
            method: route.method,
            url: format!("{}{}", self.endpoint, path),
            fields,
        })
    }

    pub fn interpret(&self, response: HttpResponse) -> Result<ResponseRecord, ApiError> {
        if self.debug {
            debug!(
                status = response.status,
                headers = response.headers.len(),
                body = %response.body,
                "response received"
            );
        }
        interpret(response)
    }
}
