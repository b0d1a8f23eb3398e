//! Warehouse configuration and the binder that reads dialect settings from it.
//!
//! A [`Configuration`] is an ordered mapping of string keys to JSON values,
//! produced by whatever loads the project's warehouse file. Dialects never
//! read it directly; they go through [`ConfigBinder`], which resolves
//! `env_var(NAME)` and `secret_file(PATH)` indirections and turns every
//! failure into a [`ConfigurationError`](crate::error::ConfigurationError)
//! naming the key.
//!
//! # Module Structure
//! - `binder`: typed extraction helpers
//! - `secret`: credential sources and zeroizing secret storage

mod binder;
mod secret;

pub use binder::ConfigBinder;
pub use secret::{Secret, SecretSource};

use crate::error::{ConfigurationError, DqScanError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the warehouse type tag.
pub const KEY_WAREHOUSE_TYPE: &str = "type";

/// Key holding the optional connection timeout, in seconds.
pub const KEY_CONNECTION_TIMEOUT: &str = "connection_timeout";

/// Ordered warehouse configuration.
///
/// # Example
/// ```rust
/// use dqscan_core::config::Configuration;
///
/// let config = Configuration::new()
///     .with("type", "postgres")
///     .with("database", "analytics");
///
/// assert_eq!(config.warehouse_type().unwrap(), "postgres");
/// assert_eq!(config.keys().collect::<Vec<_>>(), ["type", "database"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: Map<String, Value>,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON object.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    /// Returns `Serialization` if the text is not a JSON object.
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|source| DqScanError::Serialization {
            context: "Warehouse configuration must be a JSON object".to_string(),
            source,
        })
    }

    /// Builder method to set a key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets a key, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    /// Looks up a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the configuration has no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads the declared warehouse type tag.
    ///
    /// # Errors
    /// `MissingKey` if `type` is absent, `InvalidType` if it is not a string.
    pub fn warehouse_type(&self) -> Result<&str, ConfigurationError> {
        match self.values.get(KEY_WAREHOUSE_TYPE) {
            Some(Value::String(tag)) => Ok(tag),
            Some(_) => Err(ConfigurationError::InvalidType {
                key: KEY_WAREHOUSE_TYPE.to_string(),
                expected: "a string",
            }),
            None => Err(ConfigurationError::missing(KEY_WAREHOUSE_TYPE)),
        }
    }

    /// Renders the configuration as pretty JSON for scaffolding files.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(&self.values).map_err(|source| DqScanError::Serialization {
            context: "Failed to render warehouse configuration".to_string(),
            source,
        })
    }

    /// Returns a binder over this configuration.
    pub fn binder(&self) -> ConfigBinder<'_> {
        ConfigBinder::new(self)
    }
}

impl From<Map<String, Value>> for Configuration {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}
