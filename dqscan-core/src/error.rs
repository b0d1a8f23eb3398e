//! Error types for the warehouse dialect layer.
//!
//! Configuration problems are reported through [`ConfigurationError`], one
//! variant per failure mode, always naming the offending key. Everything else
//! surfaces as [`DqScanError`]. Passwords and secret-file contents never
//! appear in any error message.

use crate::dialects::{ErrorClassification, WarehouseType};
use std::path::PathBuf;
use thiserror::Error;

/// A setting is missing or malformed.
///
/// These errors happen before any network activity and are never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required key is absent
    #[error("Missing required configuration key '{key}'")]
    MissingKey { key: String },

    /// A key holds a value of the wrong shape
    #[error("Configuration key '{key}' must be {expected}")]
    InvalidType { key: String, expected: &'static str },

    /// A key holds a value of the right shape that cannot be used
    #[error("Invalid value for configuration key '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// A key refers to an environment variable that is not set
    #[error("Configuration key '{key}' refers to environment variable '{variable}', which is not set")]
    EnvVarUnset { key: String, variable: String },

    /// A key refers to a secret file that cannot be read
    #[error("Configuration key '{key}' refers to file '{}', which cannot be read", path.display())]
    SecretFileUnreadable {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key refers to a secret file that is not valid JSON
    #[error("Configuration key '{key}' refers to file '{}', which is not valid JSON", path.display())]
    MalformedSecretFile {
        key: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigurationError {
    /// Returns the configuration key this error is about.
    pub fn key(&self) -> &str {
        match self {
            Self::MissingKey { key }
            | Self::InvalidType { key, .. }
            | Self::InvalidValue { key, .. }
            | Self::EnvVarUnset { key, .. }
            | Self::SecretFileUnreadable { key, .. }
            | Self::MalformedSecretFile { key, .. } => key,
        }
    }

    pub(crate) fn missing(key: &str) -> Self {
        Self::MissingKey {
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid_value(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Main error type for dqscan operations.
///
/// # Security
/// Connection errors carry the driver error as their source. Drivers do not
/// echo passwords back, and the dialects never put credentials in `context`.
#[derive(Debug, Error)]
pub enum DqScanError {
    /// Configuration or validation error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Opening a session failed
    #[error("{warehouse} connection failed ({classification}): {context}")]
    Connection {
        warehouse: WarehouseType,
        classification: ErrorClassification,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The configuration names a warehouse type with no registered dialect
    #[error("Unsupported warehouse type '{warehouse_type}'")]
    UnsupportedWarehouse { warehouse_type: String },

    /// SQL could not be generated from the given arguments
    #[error("Query generation failed: {message}")]
    QueryGeneration { message: String },

    /// A query issued through a session failed
    #[error("Query execution failed: {context}")]
    QueryExecution {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The driver for a warehouse was not compiled in
    #[error("Unsupported operation: {feature} not supported for {warehouse}")]
    UnsupportedFeature { feature: String, warehouse: String },

    /// The global log subscriber could not be installed
    #[error("Failed to initialize logging: {message}")]
    Logging { message: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results with DqScanError
pub type Result<T> = std::result::Result<T, DqScanError>;

impl DqScanError {
    /// Creates a connection error tagged with its classification.
    pub fn connection_failed<E>(
        warehouse: WarehouseType,
        classification: ErrorClassification,
        context: impl Into<String>,
        error: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            warehouse,
            classification,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an unsupported warehouse error
    pub fn unsupported_warehouse(warehouse_type: impl Into<String>) -> Self {
        Self::UnsupportedWarehouse {
            warehouse_type: warehouse_type.into(),
        }
    }

    /// Creates a query generation error
    pub fn query_generation(message: impl Into<String>) -> Self {
        Self::QueryGeneration {
            message: message.into(),
        }
    }

    /// Creates a query execution error with context
    pub fn query_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::QueryExecution {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an unsupported feature error
    pub fn unsupported_feature(feature: impl Into<String>, warehouse: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            warehouse: warehouse.into(),
        }
    }

    /// Classification attached to a connection failure, if this is one.
    pub fn classification(&self) -> Option<ErrorClassification> {
        match self {
            Self::Connection { classification, .. } => Some(*classification),
            _ => None,
        }
    }

    /// Whether the engine may retry the failed operation with backoff.
    ///
    /// Only transient connection failures qualify. Configuration, registry,
    /// authentication and unclassified failures are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        self.classification()
            .is_some_and(|c| c == ErrorClassification::ConnectionError)
    }
}
