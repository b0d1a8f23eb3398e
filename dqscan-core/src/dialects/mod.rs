//! Warehouse dialects: one adapter per SQL backend behind a common contract.
//!
//! The scanning engine asks the [`DialectRegistry`] for a [`Dialect`] bound to
//! the project's configuration, opens [`Session`]s through it, builds every
//! introspection and validation query through it, and asks it to classify
//! connection failures. The engine never inspects which backend it talks to.
//!
//! # Module Structure
//! - `classification`: advisory error buckets and the substring matcher
//! - `registry`: warehouse type tag to dialect constructor
//! - `session`: live connection handles and scoped acquisition
//! - `retry`: backoff for transient connection failures
//! - `sql`: literal/identifier escaping and validity formats
//! - Backend modules (`postgres`, `bigquery`)

use crate::Result;
use crate::config::Configuration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod classification;
pub mod registry;
pub mod retry;
pub mod session;
pub mod sql;

pub mod bigquery;
pub mod postgres;

pub use classification::ErrorClassification;
pub use registry::DialectRegistry;
pub use retry::{RetryPolicy, open_with_retry};
pub use session::{ColumnDescriptor, QueryResult, Session, with_session};
pub use sql::ValidityFormat;

/// Canonical name returned for native types missing from a catalog.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Supported warehouse backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum WarehouseType {
    Postgres,
    BigQuery,
}

impl WarehouseType {
    /// Every known tag, in registration order.
    pub const ALL: [WarehouseType; 2] = [WarehouseType::Postgres, WarehouseType::BigQuery];

    /// The tag used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseType::Postgres => "postgres",
            WarehouseType::BigQuery => "bigquery",
        }
    }
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarehouseType {
    type Err = crate::error::DqScanError;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|known| known.as_str() == tag.trim().to_lowercase())
            .ok_or_else(|| crate::error::DqScanError::unsupported_warehouse(tag))
    }
}

/// A backend-native type identifier as reported by a driver or catalog view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// Numeric type code (PostgreSQL OIDs)
    Code(u32),
    /// Type name (BigQuery field types, `information_schema` data types)
    Name(String),
}

impl From<u32> for NativeType {
    fn from(code: u32) -> Self {
        Self::Code(code)
    }
}

impl From<&str> for NativeType {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Per-backend adapter used by the scanning engine.
///
/// A dialect is immutable once bound. `open_connection` takes `&self` and
/// shares no mutable state, so parallel scan units can each open their own
/// session from the same dialect.
///
/// # Object Safety
/// This trait is object-safe; the registry hands out `Box<dyn Dialect>`.
#[async_trait]
pub trait Dialect: Send + Sync + fmt::Debug {
    /// The tag this dialect was registered under.
    fn warehouse_type(&self) -> WarehouseType;

    /// Opens a live session.
    ///
    /// # Errors
    /// `Connection` tagged with [`Dialect::classify_exception`]'s verdict.
    /// Partially constructed clients are dropped before returning.
    async fn open_connection(&self) -> Result<Box<dyn Session>>;

    /// Quotes a table name, qualified with the bound schema or dataset.
    fn qualify_table_name(&self, name: &str) -> String;

    /// Quotes a column name.
    fn qualify_column_name(&self, name: &str) -> String;

    /// Lists tables of the bound schema or dataset.
    ///
    /// `filter` is a SQL `LIKE` pattern on the table name; `limit` caps the
    /// number of rows.
    fn tables_metadata_query(&self, limit: Option<u32>, filter: Option<&str>) -> String;

    /// Lists `column_name, data_type, is_nullable` for one table.
    ///
    /// # Errors
    /// `QueryGeneration` if `table_name` is empty.
    fn columns_metadata_query(&self, table_name: &str) -> Result<String>;

    /// Boolean expression testing `expr` against a regular expression.
    ///
    /// `pattern` is escaped here; callers pass it unescaped.
    fn expr_regexp_like(&self, expr: &str, pattern: &str) -> String;

    /// Expression casting a text column to the dialect's decimal type.
    ///
    /// # Errors
    /// `QueryGeneration` if `validity_format` is not a numeric format.
    fn expr_cast_text_to_number(&self, quoted_column: &str, validity_format: &str)
    -> Result<String>;

    /// Maps a native type to its canonical name, or [`UNKNOWN_TYPE`].
    fn resolve_type_name(&self, native: &NativeType) -> &'static str;

    /// Classifies raw driver error text.
    fn classify_message(&self, _message: &str) -> ErrorClassification {
        ErrorClassification::Unclassified
    }

    /// Classifies an error by the text of its whole source chain.
    fn classify_exception(&self, error: &(dyn std::error::Error + 'static)) -> ErrorClassification {
        self.classify_message(&classification::error_chain_text(error))
    }
}

/// Construction side of a dialect, used by the registry.
///
/// Kept apart from [`Dialect`] so the latter stays object-safe.
pub trait BindDialect: Dialect + Sized + 'static {
    /// Tag this dialect handles.
    const WAREHOUSE_TYPE: WarehouseType;

    /// Builds a fully populated dialect from configuration.
    ///
    /// # Errors
    /// A `ConfigurationError` naming the first missing or malformed key.
    fn bind(config: &Configuration) -> Result<Self>;

    /// Placeholder configuration for scaffolding a new project.
    fn default_configuration_template() -> Configuration;

    /// Placeholder environment variables the template refers to.
    fn default_env_vars() -> Vec<(String, String)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warehouse_type_tags_round_trip() {
        for warehouse in WarehouseType::ALL {
            assert_eq!(warehouse.as_str().parse::<WarehouseType>().unwrap(), warehouse);
            assert_eq!(warehouse.to_string(), warehouse.as_str());
        }
        assert_eq!(
            " Postgres ".parse::<WarehouseType>().unwrap(),
            WarehouseType::Postgres
        );
    }

    #[test]
    fn test_unknown_warehouse_tag() {
        let error = "snowflake".parse::<WarehouseType>().unwrap_err();
        assert!(matches!(
            error,
            crate::error::DqScanError::UnsupportedWarehouse { ref warehouse_type } if warehouse_type == "snowflake"
        ));
    }

    #[test]
    fn test_native_type_conversions() {
        assert_eq!(NativeType::from(23), NativeType::Code(23));
        assert_eq!(NativeType::from("INT64"), NativeType::Name("INT64".to_string()));
    }
}
