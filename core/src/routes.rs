//! Named API routes and the table that holds them.
//!
//! # Design
//! Each route carries two capability flags, `Signing` and `Execution`, as
//! small enums. The dispatcher checks each flag once per call. On disk the
//! flags are the `Signed` and `Async` booleans.
//!
//! `RouteTable` is insertion-ordered and key-unique. Inserting a route whose
//! name already exists replaces the earlier definition in place: the table
//! keeps the first position and the last definition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::flag;
use crate::error::RouteNotFound;
use crate::http::HttpMethod;

/// Whether requests on a route carry a `signature`/`t` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signing {
    Signed,
    #[default]
    Unsigned,
}

/// Whether a route blocks the calling thread or completes in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    #[default]
    Blocking,
    Background,
}

/// A single named route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PersistedRoute", into = "PersistedRoute")]
pub struct RouteSpec {
    pub name: String,
    pub method: HttpMethod,
    /// Path template, relative to the endpoint. May contain placeholders
    /// such as `{id}`.
    pub path: String,
    pub signing: Signing,
    pub execution: Execution,
}

impl RouteSpec {
    /// An unsigned, blocking route.
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            signing: Signing::Unsigned,
            execution: Execution::Blocking,
        }
    }

    pub fn signed(mut self) -> Self {
        self.signing = Signing::Signed;
        self
    }

    pub fn background(mut self) -> Self {
        self.execution = Execution::Background;
        self
    }

    pub fn is_signed(&self) -> bool {
        self.signing == Signing::Signed
    }

    pub fn is_async(&self) -> bool {
        self.execution == Execution::Background
    }

    /// Reject routes the editor would never have saved.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("route name is empty".to_string());
        }
        if self.path.is_empty() {
            return Err(format!("route {:?} has an empty path", self.name));
        }
        Ok(())
    }
}

/// On-disk shape of a route. `Signed` is the canonical key; `Secure` is
/// still read so older documents keep their flag.
#[derive(Serialize, Deserialize)]
struct PersistedRoute {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Method")]
    method: HttpMethod,
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Async", with = "flag")]
    is_async: bool,
    #[serde(rename = "Signed", alias = "Secure", with = "flag")]
    is_signed: bool,
}

impl From<PersistedRoute> for RouteSpec {
    fn from(raw: PersistedRoute) -> Self {
        Self {
            name: raw.name,
            method: raw.method,
            path: raw.path,
            signing: if raw.is_signed {
                Signing::Signed
            } else {
                Signing::Unsigned
            },
            execution: if raw.is_async {
                Execution::Background
            } else {
                Execution::Blocking
            },
        }
    }
}

impl From<RouteSpec> for PersistedRoute {
    fn from(route: RouteSpec) -> Self {
        Self {
            is_async: route.is_async(),
            is_signed: route.is_signed(),
            name: route.name,
            method: route.method,
            path: route.path,
        }
    }
}

/// Routes keyed by name, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: IndexMap<String, RouteSpec>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a sequence. Later duplicates win.
    pub fn from_routes(routes: impl IntoIterator<Item = RouteSpec>) -> Self {
        let mut table = Self::new();
        for route in routes {
            table.insert(route);
        }
        table
    }

    pub fn get(&self, name: &str) -> Result<&RouteSpec, RouteNotFound> {
        self.routes.get(name).ok_or_else(|| RouteNotFound {
            name: name.to_string(),
        })
    }

    /// Add or replace a route, returning the definition it replaced.
    pub fn insert(&mut self, route: RouteSpec) -> Option<RouteSpec> {
        self.routes.insert(route.name.clone(), route)
    }

    pub fn remove(&mut self, name: &str) -> Option<RouteSpec> {
        self.routes.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The routes as an ordered sequence, ready to persist.
    pub fn to_routes(&self) -> Vec<RouteSpec> {
        self.routes.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> RouteSpec {
        RouteSpec::new("users", HttpMethod::Get, "/users")
    }

    #[test]
    fn get_missing_route_fails() {
        let table = RouteTable::from_routes([users()]);
        let err = table.get("scores").unwrap_err();
        assert_eq!(err.name, "scores");
        assert!(table.get("users").is_ok());
    }

    #[test]
    fn duplicate_names_keep_last_definition_at_first_position() {
        let table = RouteTable::from_routes([
            users(),
            RouteSpec::new("status", HttpMethod::Get, "/status"),
            RouteSpec::new("users", HttpMethod::Post, "/v2/users").signed(),
        ]);
        assert_eq!(table.len(), 2);
        let route = table.get("users").unwrap();
        assert_eq!(route.method, HttpMethod::Post);
        assert_eq!(route.path, "/v2/users");
        assert!(route.is_signed());

        let names: Vec<_> = table.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["users", "status"]);
    }

    #[test]
    fn remove_preserves_order() {
        let mut table = RouteTable::from_routes([
            RouteSpec::new("a", HttpMethod::Get, "/a"),
            RouteSpec::new("b", HttpMethod::Get, "/b"),
            RouteSpec::new("c", HttpMethod::Get, "/c"),
        ]);
        assert!(table.remove("b").is_some());
        assert!(table.remove("b").is_none());
        let names: Vec<_> = table.to_routes().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn persisted_route_uses_string_flags() {
        let route = RouteSpec::new("score", HttpMethod::Post, "/scores")
            .signed()
            .background();
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["Name"], "score");
        assert_eq!(json["Method"], "POST");
        assert_eq!(json["Path"], "/scores");
        assert_eq!(json["Async"], "true");
        assert_eq!(json["Signed"], "true");
    }

    #[test]
    fn legacy_secure_key_is_read_as_signed() {
        let raw = r#"{"Name":"x","Method":"GET","Path":"/x","Async":"False","Secure":"True"}"#;
        let route: RouteSpec = serde_json::from_str(raw).unwrap();
        assert!(route.is_signed());
        assert!(!route.is_async());
    }

    #[test]
    fn signed_and_secure_together_are_a_duplicate_field() {
        let raw = r#"{"Name":"x","Method":"GET","Path":"/x","Async":"false","Signed":"true","Secure":"false"}"#;
        let err = serde_json::from_str::<RouteSpec>(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate field `Signed`"), "{err}");
    }

    #[test]
    fn missing_signed_flag_is_an_error() {
        let raw = r#"{"Name":"x","Method":"GET","Path":"/x","Async":"false"}"#;
        assert!(serde_json::from_str::<RouteSpec>(raw).is_err());
    }

    #[test]
    fn validate_rejects_empty_name_and_path() {
        assert!(RouteSpec::new("", HttpMethod::Get, "/x").validate().is_err());
        assert!(RouteSpec::new("x", HttpMethod::Get, "").validate().is_err());
        assert!(users().validate().is_ok());
    }
}
