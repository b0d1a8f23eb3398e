//! Warehouse type to dialect constructor registry.
//!
//! The registry is explicitly constructed rather than global. Each backend
//! module exposes a `register` function that adds itself; the engine only
//! ever calls [`DialectRegistry::create`] and never matches on a backend.

use super::{BindDialect, Dialect, WarehouseType};
use crate::config::Configuration;
use crate::error::{DqScanError, Result};
use std::collections::BTreeMap;

type BindFn = fn(&Configuration) -> Result<Box<dyn Dialect>>;
type TemplateFn = fn() -> Configuration;
type EnvVarsFn = fn() -> Vec<(String, String)>;

#[derive(Clone, Copy)]
struct DialectEntry {
    bind: BindFn,
    template: TemplateFn,
    env_vars: EnvVarsFn,
}

fn bind_boxed<D: BindDialect>(config: &Configuration) -> Result<Box<dyn Dialect>> {
    Ok(Box::new(D::bind(config)?))
}

/// Registry of dialect constructors keyed by warehouse type.
///
/// # Example
/// ```rust
/// use dqscan_core::config::Configuration;
/// use dqscan_core::dialects::{DialectRegistry, WarehouseType};
///
/// let registry = DialectRegistry::with_builtins();
/// let config = Configuration::new()
///     .with("type", "postgres")
///     .with("username", "u")
///     .with("password", "p")
///     .with("database", "d")
///     .with("schema", "s");
///
/// let dialect = registry.create(&config).unwrap();
/// assert_eq!(dialect.warehouse_type(), WarehouseType::Postgres);
/// ```
#[derive(Default, Clone)]
pub struct DialectRegistry {
    entries: BTreeMap<WarehouseType, DialectEntry>,
}

impl DialectRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in backend registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::postgres::register(&mut registry);
        super::bigquery::register(&mut registry);
        registry
    }

    /// Registers a dialect under its [`BindDialect::WAREHOUSE_TYPE`].
    ///
    /// A later registration for the same tag replaces the earlier one.
    pub fn register<D: BindDialect>(&mut self) {
        tracing::trace!("Registering dialect for {}", D::WAREHOUSE_TYPE);
        self.entries.insert(
            D::WAREHOUSE_TYPE,
            DialectEntry {
                bind: bind_boxed::<D>,
                template: D::default_configuration_template,
                env_vars: D::default_env_vars,
            },
        );
    }

    /// Whether a dialect is registered for `warehouse`.
    pub fn contains(&self, warehouse: WarehouseType) -> bool {
        self.entries.contains_key(&warehouse)
    }

    /// Registered warehouse types, in tag order.
    pub fn warehouse_types(&self) -> impl Iterator<Item = WarehouseType> + '_ {
        self.entries.keys().copied()
    }

    fn entry(&self, tag: &str) -> Result<(WarehouseType, &DialectEntry)> {
        let warehouse: WarehouseType = tag.parse()?;
        self.entries
            .get(&warehouse)
            .map(|entry| (warehouse, entry))
            .ok_or_else(|| DqScanError::unsupported_warehouse(tag))
    }

    /// Builds the dialect declared by the configuration's `type` key.
    ///
    /// # Errors
    /// - `Configuration` if `type` is absent or not a string
    /// - `UnsupportedWarehouse` if the tag is unknown or not registered
    /// - `Configuration` from the dialect's own binding
    pub fn create(&self, config: &Configuration) -> Result<Box<dyn Dialect>> {
        let tag = config.warehouse_type()?;
        let (warehouse, entry) = self.entry(tag)?;
        let dialect = (entry.bind)(config)?;
        tracing::debug!("Bound {} dialect", warehouse);
        Ok(dialect)
    }

    /// Placeholder configuration for scaffolding a project on `tag`.
    ///
    /// # Errors
    /// `UnsupportedWarehouse` if the tag is unknown or not registered.
    pub fn template(&self, tag: &str) -> Result<Configuration> {
        let (_, entry) = self.entry(tag)?;
        Ok((entry.template)())
    }

    /// Placeholder environment variables for scaffolding a project on `tag`.
    ///
    /// # Errors
    /// `UnsupportedWarehouse` if the tag is unknown or not registered.
    pub fn env_var_template(&self, tag: &str) -> Result<Vec<(String, String)>> {
        let (_, entry) = self.entry(tag)?;
        Ok((entry.env_vars)())
    }
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bound_config(warehouse: WarehouseType) -> Configuration {
        match warehouse {
            WarehouseType::Postgres => Configuration::new()
                .with("type", "postgres")
                .with("username", "u")
                .with("password", "p")
                .with("database", "d")
                .with("schema", "s"),
            WarehouseType::BigQuery => Configuration::new()
                .with("type", "bigquery")
                .with("account_info", json!({"project_id": "p", "type": "service_account"}))
                .with("dataset", "ds"),
        }
    }

    #[test]
    fn test_create_returns_requested_warehouse_type() {
        let registry = DialectRegistry::with_builtins();
        for warehouse in WarehouseType::ALL {
            let dialect = registry.create(&bound_config(warehouse)).unwrap();
            assert_eq!(dialect.warehouse_type(), warehouse);
        }
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        let registry = DialectRegistry::with_builtins();
        let config = Configuration::new().with("type", "snowflake");
        assert!(matches!(
            registry.create(&config),
            Err(DqScanError::UnsupportedWarehouse { ref warehouse_type }) if warehouse_type == "snowflake"
        ));
        assert!(registry.template("snowflake").is_err());
    }

    #[test]
    fn test_unregistered_tag_is_unsupported() {
        let registry = DialectRegistry::new();
        assert!(matches!(
            registry.create(&bound_config(WarehouseType::Postgres)),
            Err(DqScanError::UnsupportedWarehouse { .. })
        ));
    }

    #[test]
    fn test_missing_type_key() {
        let registry = DialectRegistry::with_builtins();
        let error = registry.create(&Configuration::new()).unwrap_err();
        assert!(matches!(
            error,
            DqScanError::Configuration(ref inner) if inner.key() == "type"
        ));
    }

    #[test]
    fn test_binding_errors_pass_through() {
        let registry = DialectRegistry::with_builtins();
        let mut config = bound_config(WarehouseType::Postgres);
        config.remove("schema");
        assert!(matches!(
            registry.create(&config),
            Err(DqScanError::Configuration(ref inner)) if inner.key() == "schema"
        ));
    }

    #[test]
    fn test_templates_carry_their_tag() {
        let registry = DialectRegistry::with_builtins();
        for warehouse in registry.warehouse_types() {
            let template = registry.template(warehouse.as_str()).unwrap();
            assert_eq!(template.warehouse_type().unwrap(), warehouse.as_str());
        }
        assert_eq!(
            registry.warehouse_types().collect::<Vec<_>>(),
            WarehouseType::ALL
        );
    }

    #[test]
    fn test_env_var_templates() {
        let registry = DialectRegistry::with_builtins();
        let postgres = registry.env_var_template("postgres").unwrap();
        assert!(postgres.iter().any(|(name, _)| name == "POSTGRES_PASSWORD"));
        assert!(registry.env_var_template("bigquery").unwrap().is_empty());
    }
}
