//! Google BigQuery dialect.
//!
//! # Module Structure
//! - `connection`: gcp-bigquery-client sessions (requires the `bigquery` feature)
//! - `sql`: introspection queries and validation expressions
//! - `type_mapping`: standard and legacy SQL type names
//!
//! Catalog views are addressed as `` `dataset.INFORMATION_SCHEMA.*` `` and
//! compare names case-sensitively.

#[cfg(feature = "bigquery")]
mod connection;
mod sql;
mod type_mapping;


use super::{BindDialect, Dialect, DialectRegistry, NativeType, Session, WarehouseType};
use crate::Result;
use crate::config::{Configuration, KEY_CONNECTION_TIMEOUT, KEY_WAREHOUSE_TYPE, Secret};
use crate::error::ConfigurationError;
use async_trait::async_trait;
use std::time::Duration;

pub use type_mapping::lookup_type_name;

const KEY_ACCOUNT_INFO: &str = "account_info";

/// Dialect bound to one BigQuery dataset.
#[derive(Clone)]
pub struct BigQueryDialect {
    project_id: String,
    dataset: String,
    account_info: Secret,
    connection_timeout: Option<Duration>,
}

impl BigQueryDialect {
    /// Project that owns the service account and runs the jobs.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Target dataset; every generated query is restricted to it.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Connection establishment timeout, if configured.
    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout
    }
}

impl std::fmt::Debug for BigQueryDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryDialect")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("account_info", &"****")
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

/// Registers the BigQuery dialect.
pub fn register(registry: &mut DialectRegistry) {
    registry.register::<BigQueryDialect>();
}

impl BindDialect for BigQueryDialect {
    const WAREHOUSE_TYPE: WarehouseType = WarehouseType::BigQuery;

    fn bind(config: &Configuration) -> Result<Self> {
        let binder = config.binder();

        let (account_info, fields) = binder.required_json_file(KEY_ACCOUNT_INFO)?;
        let project_id = fields
            .get("project_id")
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                ConfigurationError::invalid_value(
                    KEY_ACCOUNT_INFO,
                    "service account info must contain 'project_id'",
                )
            })?
            .to_string();

        Ok(Self {
            project_id,
            dataset: binder.required_str_env("dataset")?,
            account_info,
            connection_timeout: binder.optional_seconds(KEY_CONNECTION_TIMEOUT)?,
        })
    }

    fn default_configuration_template() -> Configuration {
        Configuration::new()
            .with(KEY_WAREHOUSE_TYPE, WarehouseType::BigQuery.as_str())
            .with(KEY_ACCOUNT_INFO, "--- ENTER PATH TO ACCOUNT INFO HERE ---")
            .with("dataset", "--- ENTER BIGQUERY DATASET HERE ---")
    }
}

#[async_trait]
impl Dialect for BigQueryDialect {
    fn warehouse_type(&self) -> WarehouseType {
        WarehouseType::BigQuery
    }

    #[cfg(feature = "bigquery")]
    async fn open_connection(&self) -> Result<Box<dyn Session>> {
        let session = self.connect().await?;
        Ok(Box::new(session))
    }

    #[cfg(not(feature = "bigquery"))]
    async fn open_connection(&self) -> Result<Box<dyn Session>> {
        Err(crate::error::DqScanError::unsupported_feature(
            "sessions (built without the `bigquery` feature)",
            WarehouseType::BigQuery.as_str(),
        ))
    }

    fn qualify_table_name(&self, name: &str) -> String {
        self.quote_table(name)
    }

    fn qualify_column_name(&self, name: &str) -> String {
        sql::quote(name)
    }

    fn tables_metadata_query(&self, limit: Option<u32>, filter: Option<&str>) -> String {
        self.tables_query(limit, filter)
    }

    fn columns_metadata_query(&self, table_name: &str) -> Result<String> {
        self.columns_query(table_name)
    }

    fn expr_regexp_like(&self, expr: &str, pattern: &str) -> String {
        sql::regexp_like(expr, pattern)
    }

    fn expr_cast_text_to_number(&self, quoted_column: &str, validity_format: &str) -> Result<String> {
        sql::cast_text_to_number(quoted_column, validity_format.parse()?)
    }

    fn resolve_type_name(&self, native: &NativeType) -> &'static str {
        type_mapping::resolve(native)
    }
}
