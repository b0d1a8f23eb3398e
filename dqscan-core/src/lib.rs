//! Warehouse dialect layer for the dqscan data-quality scanner.
//!
//! This crate lets one scanning engine run the same metadata and profiling
//! queries against several SQL warehouses. Each backend is a [`Dialect`]
//! that binds its settings from a [`Configuration`], opens [`Session`]s,
//! generates introspection SQL and validation expressions in its own syntax,
//! maps native type identifiers to canonical names, and classifies
//! connection failures.
//!
//! # Security Guarantees
//! - Credentials are resolved once at bind time into zeroizing storage
//! - No credential appears in `Debug` output, log lines or error messages
//! - Every generated query is restricted to the bound schema or dataset
//!
//! # Architecture
//! - Registry pattern for dialect construction by warehouse type tag
//! - Fallible binding: a dialect is either fully populated or not built
//! - Scoped sessions closed exactly once, even on failure

pub mod config;
pub mod dialects;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{ConfigBinder, Configuration, Secret, SecretSource};
pub use dialects::{
    BindDialect, ColumnDescriptor, Dialect, DialectRegistry, ErrorClassification, NativeType,
    QueryResult, RetryPolicy, Session, UNKNOWN_TYPE, ValidityFormat, WarehouseType,
    open_with_retry, with_session,
};
pub use error::{ConfigurationError, DqScanError, Result};
pub use logging::init_logging;
