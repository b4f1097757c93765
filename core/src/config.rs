//! Loading and saving the client configuration.
//!
//! # Design
//! The configuration is one JSON object:
//!
//! ```json
//! {
//!   "endpoint": "https://api.example.com",
//!   "apiKey": "key",
//!   "apiSecret": "secret",
//!   "debug": "false",
//!   "routes": [
//!     { "Name": "user", "Method": "GET", "Path": "/users/{id}", "Async": "false", "Signed": "true" }
//!   ]
//! }
//! ```
//!
//! Where it lives is decided by the `ConfigStore` handed to the client, not
//! by a compiled-in path. A missing file is a first run and yields the
//! default configuration; a file that exists but does not parse is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::routes::RouteSpec;

/// Everything a client needs, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL. Route paths are appended verbatim.
    pub endpoint: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(with = "flag")]
    pub debug: bool,
    pub routes: Vec<RouteSpec>,
}

impl Default for ClientConfig {
    /// First-run configuration: no endpoint, no credentials, no routes,
    /// debug output on.
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            debug: true,
            routes: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        for (index, route) in config.routes.iter().enumerate() {
            route
                .validate()
                .map_err(|reason| ConfigError::InvalidRoute { index, reason })?;
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Encode)
    }
}

/// Somewhere a `ClientConfig` can be loaded from and saved to.
pub trait ConfigStore {
    fn load(&self) -> Result<ClientConfig, ConfigError>;
    fn save(&self, config: &ClientConfig) -> Result<(), ConfigError>;
}

/// A configuration document on disk.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<ClientConfig, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => ClientConfig::from_json(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config found, using defaults");
                Ok(ClientConfig::default())
            }
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn save(&self, config: &ClientConfig) -> Result<(), ConfigError> {
        let raw = config.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        fs::write(&self.path, raw).map_err(|err| self.io_error(err))
    }
}

/// A configuration document held in memory. Starts empty (first run) unless
/// constructed with a document.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    document: Mutex<Option<String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(raw: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(raw.into())),
        }
    }

    /// The current document text, if any has been stored.
    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<ClientConfig, ConfigError> {
        match self.document() {
            Some(raw) => ClientConfig::from_json(&raw),
            None => Ok(ClientConfig::default()),
        }
    }

    fn save(&self, config: &ClientConfig) -> Result<(), ConfigError> {
        let raw = config.to_json()?;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }
}

/// Booleans persisted as the strings `"true"` / `"false"`.
///
/// Reading is lenient in the ways older documents need: the strings match
/// case-insensitively and surrounding whitespace is ignored, and native JSON
/// booleans are accepted. Anything else is an error.
pub(crate) mod flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => Ok(value),
            Raw::Text(text) => {
                let trimmed = text.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(D::Error::custom(format!(
                        "expected \"true\" or \"false\", found {text:?}"
                    )))
                }
            }
        }
    }
}
