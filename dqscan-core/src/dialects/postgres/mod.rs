//! PostgreSQL dialect.
//!
//! # Module Structure
//! - `connection`: sqlx-backed sessions (requires the `postgres` feature)
//! - `sql`: introspection queries and validation expressions
//! - `type_mapping`: built-in type OID catalog
//!
//! # Security
//! - The password is resolved at bind time into a zeroizing container
//! - `Debug` output and log lines never include the password
//! - Connection error context names only host, port and database

#[cfg(feature = "postgres")]
mod connection;
mod sql;
mod type_mapping;


use super::classification::ClassificationRules;
use super::{
    BindDialect, Dialect, DialectRegistry, ErrorClassification, NativeType, Session,
    WarehouseType,
};
use crate::Result;
use crate::config::{Configuration, KEY_CONNECTION_TIMEOUT, KEY_WAREHOUSE_TYPE, Secret};
use crate::error::ConfigurationError;
use async_trait::async_trait;
use std::sync::OnceLock;
use std::time::Duration;

pub use type_mapping::{lookup_type_code, lookup_type_name};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5432;

/// Name reported to the server as `application_name`.
pub const APPLICATION_NAME: &str = "dqscan";

/// Dialect bound to one PostgreSQL database and schema.
#[derive(Clone)]
pub struct PostgresDialect {
    host: String,
    port: u16,
    username: String,
    password: Secret,
    database: String,
    schema: String,
    connection_timeout: Option<Duration>,
}

impl PostgresDialect {
    /// Server host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Role used to connect.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Target database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Target schema; every generated query is restricted to it.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Connection establishment timeout, if configured.
    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout
    }

    /// `host:port/database`, safe to show in errors and logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl std::fmt::Debug for PostgresDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDialect")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"****")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

/// Registers the PostgreSQL dialect.
pub fn register(registry: &mut DialectRegistry) {
    registry.register::<PostgresDialect>();
}

fn classification_rules() -> &'static ClassificationRules {
    static RULES: OnceLock<ClassificationRules> = OnceLock::new();
    RULES.get_or_init(|| ClassificationRules {
        connection: &[
            "Operation timed out",
            "could not translate host name",
            "could not connect to server",
            "No route to host",
            "no route to host",
            "timeout expired",
        ],
        authentication: &["Connection refused", "password authentication failed"],
        authentication_patterns: vec![
            regex::Regex::new(r#"role ".*" does not exist"#).expect("Invalid role pattern"),
        ],
    })
}

impl BindDialect for PostgresDialect {
    const WAREHOUSE_TYPE: WarehouseType = WarehouseType::Postgres;

    fn bind(config: &Configuration) -> Result<Self> {
        let binder = config.binder();

        let port = match binder.optional_int("port")? {
            None => DEFAULT_PORT,
            Some(port) => u16::try_from(port)
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| {
                    ConfigurationError::invalid_value("port", "must be between 1 and 65535")
                })?,
        };

        Ok(Self {
            host: binder.optional_str_env("host", DEFAULT_HOST)?,
            port,
            username: binder.required_str_env("username")?,
            password: binder.credential("password")?,
            database: binder.required_str_env("database")?,
            schema: binder.required_str_env("schema")?,
            connection_timeout: binder.optional_seconds(KEY_CONNECTION_TIMEOUT)?,
        })
    }

    fn default_configuration_template() -> Configuration {
        Configuration::new()
            .with(KEY_WAREHOUSE_TYPE, WarehouseType::Postgres.as_str())
            .with("host", DEFAULT_HOST)
            .with("port", DEFAULT_PORT.to_string())
            .with("username", "env_var(POSTGRES_USERNAME)")
            .with("password", "env_var(POSTGRES_PASSWORD)")
            .with("database", "your_database")
            .with("schema", "public")
    }

    fn default_env_vars() -> Vec<(String, String)> {
        vec![
            ("POSTGRES_USERNAME".to_string(), "Eg johndoe".to_string()),
            ("POSTGRES_PASSWORD".to_string(), "Eg abc123".to_string()),
        ]
    }
}

#[async_trait]
impl Dialect for PostgresDialect {
    fn warehouse_type(&self) -> WarehouseType {
        WarehouseType::Postgres
    }

    #[cfg(feature = "postgres")]
    async fn open_connection(&self) -> Result<Box<dyn Session>> {
        let session = self.connect().await?;
        Ok(Box::new(session))
    }

    #[cfg(not(feature = "postgres"))]
    async fn open_connection(&self) -> Result<Box<dyn Session>> {
        Err(crate::error::DqScanError::unsupported_feature(
            "sessions (built without the `postgres` feature)",
            WarehouseType::Postgres.as_str(),
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

    fn classify_message(&self, message: &str) -> ErrorClassification {
        classification_rules().classify(message)
    }
}
