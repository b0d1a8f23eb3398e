//! Typed extraction helpers used by dialects to bind their settings.

use super::Configuration;
use super::secret::{Secret, SecretSource, env_var_name, read_env_var};
use crate::error::ConfigurationError;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Reads dialect settings out of a [`Configuration`].
///
/// Every helper fails fast with a [`ConfigurationError`] naming the key, so
/// the CLI can say exactly which setting is broken.
///
/// # Example
/// ```rust
/// use dqscan_core::config::Configuration;
///
/// let config = Configuration::new().with("database", "analytics");
/// let binder = config.binder();
///
/// assert_eq!(binder.required_str("database").unwrap(), "analytics");
/// assert_eq!(binder.optional_str("host", "localhost").unwrap(), "localhost");
/// assert_eq!(binder.required_str("schema").unwrap_err().key(), "schema");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConfigBinder<'a> {
    config: &'a Configuration,
}

impl<'a> ConfigBinder<'a> {
    /// Creates a binder over `config`.
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// Raw string value, `None` when absent or null.
    fn raw_str(&self, key: &str) -> Result<Option<&'a str>, ConfigurationError> {
        match self.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(_) => Err(ConfigurationError::InvalidType {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// Required literal string.
    pub fn required_str(&self, key: &str) -> Result<String, ConfigurationError> {
        self.raw_str(key)?
            .map(str::to_string)
            .ok_or_else(|| ConfigurationError::missing(key))
    }

    /// Optional literal string with a default.
    pub fn optional_str(&self, key: &str, default: &str) -> Result<String, ConfigurationError> {
        Ok(self.raw_str(key)?.unwrap_or(default).to_string())
    }

    /// Optional string that may be an `env_var(NAME)` indirection.
    pub fn optional_str_env(&self, key: &str, default: &str) -> Result<String, ConfigurationError> {
        match self.raw_str(key)? {
            Some(raw) => resolve_env(key, raw),
            None => Ok(default.to_string()),
        }
    }

    /// Required string that may be an `env_var(NAME)` indirection.
    pub fn required_str_env(&self, key: &str) -> Result<String, ConfigurationError> {
        let raw = self
            .raw_str(key)?
            .ok_or_else(|| ConfigurationError::missing(key))?;
        resolve_env(key, raw)
    }

    /// Required integer. Accepts JSON integers and numeric strings.
    pub fn required_int(&self, key: &str) -> Result<i64, ConfigurationError> {
        self.optional_int(key)?
            .ok_or_else(|| ConfigurationError::missing(key))
    }

    /// Optional integer. Accepts JSON integers and numeric strings.
    pub fn optional_int(&self, key: &str) -> Result<Option<i64>, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidType {
            key: key.to_string(),
            expected: "an integer",
        };
        match self.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(invalid),
            Some(Value::String(raw)) => resolve_env(key, raw)?
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| invalid()),
            Some(_) => Err(invalid()),
        }
    }

    /// Optional positive number of seconds.
    pub fn optional_seconds(&self, key: &str) -> Result<Option<Duration>, ConfigurationError> {
        match self.optional_int(key)? {
            None => Ok(None),
            Some(seconds) => u64::try_from(seconds)
                .ok()
                .filter(|s| *s > 0)
                .map(|s| Some(Duration::from_secs(s)))
                .ok_or_else(|| {
                    ConfigurationError::invalid_value(key, "must be a positive number of seconds")
                }),
        }
    }

    /// Required credential.
    ///
    /// The value is taken literally unless it is an `env_var(NAME)` or
    /// `secret_file(PATH)` indirection, which is resolved immediately.
    pub fn credential(&self, key: &str) -> Result<Secret, ConfigurationError> {
        let raw = self
            .raw_str(key)?
            .ok_or_else(|| ConfigurationError::missing(key))?;
        SecretSource::parse(raw).resolve(key)
    }

    /// Required structured secret: either an inline JSON object or the path
    /// (possibly `env_var`-indirected) of a file containing one.
    ///
    /// Returns the JSON text in a zeroizing container together with the
    /// parsed object, so callers can validate fields without keeping a plain
    /// copy around.
    pub fn required_json_file(
        &self,
        key: &str,
    ) -> Result<(Secret, Map<String, Value>), ConfigurationError> {
        match self.config.get(key) {
            None | Some(Value::Null) => Err(ConfigurationError::missing(key)),
            Some(Value::Object(inline)) => {
                let text = serde_json::to_string(inline)
                    .map_err(|e| ConfigurationError::invalid_value(key, e.to_string()))?;
                Ok((Secret::new(text), inline.clone()))
            }
            Some(Value::String(raw)) => {
                let path = PathBuf::from(resolve_env(key, raw)?);
                let text = SecretSource::File(path.clone()).resolve(key)?;
                let parsed: Value = serde_json::from_str(text.expose()).map_err(|source| {
                    ConfigurationError::MalformedSecretFile {
                        key: key.to_string(),
                        path: path.clone(),
                        source,
                    }
                })?;
                match parsed {
                    Value::Object(object) => Ok((text, object)),
                    _ => Err(ConfigurationError::invalid_value(
                        key,
                        format!("file '{}' must contain a JSON object", path.display()),
                    )),
                }
            }
            Some(_) => Err(ConfigurationError::InvalidType {
                key: key.to_string(),
                expected: "a file path or a JSON object",
            }),
        }
    }
}

fn resolve_env(key: &str, raw: &str) -> Result<String, ConfigurationError> {
    match env_var_name(raw) {
        Some(variable) => read_env_var(key, variable),
        None => Ok(raw.to_string()),
    }
}
