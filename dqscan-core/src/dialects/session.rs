//! Live warehouse sessions.
//!
//! A session is owned by the code path that opened it and is closed exactly
//! once: [`Session::close`] consumes the handle. [`with_session`] wraps the
//! open/use/close sequence so the close also happens when the work fails.

use super::{Dialect, NativeType, WarehouseType};
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

/// A result column as described by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub native_type: NativeType,
}

/// Rows returned by [`Session::query`], values in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Values of one column across all rows.
    pub fn column_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a serde_json::Value> {
        let index = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|i| row.get(i)))
    }
}

/// Single-owner connection handle.
///
/// Sessions are not shared between concurrent callers; each parallel unit
/// opens its own through [`Dialect::open_connection`].
#[async_trait]
pub trait Session: Send {
    /// Backend this session talks to.
    fn warehouse_type(&self) -> WarehouseType;

    /// Runs one statement and returns its rows.
    ///
    /// # Errors
    /// `QueryExecution` wrapping the driver error.
    async fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Closes the session, releasing the backend connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a session, runs `work`, and closes the session whatever happens.
///
/// The error from `work` takes precedence over a close failure, which is then
/// only logged.
///
/// # Example
/// ```rust,ignore
/// let tables = with_session(dialect.as_ref(), |session| {
///     Box::pin(async move { session.query(&sql).await })
/// })
/// .await?;
/// ```
pub async fn with_session<T, F>(dialect: &dyn Dialect, work: F) -> Result<T>
where
    T: Send,
    F: for<'s> FnOnce(&'s mut Box<dyn Session>) -> BoxFuture<'s, Result<T>> + Send,
{
    let mut session = dialect.open_connection().await?;
    tracing::debug!("Opened {} session", dialect.warehouse_type());

    let outcome = work(&mut session).await;
    let closed = session.close().await;
    tracing::debug!("Closed {} session", dialect.warehouse_type());

    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Err(error), Err(close_error)) => {
            tracing::warn!(
                "Failed to close {} session after error: {}",
                dialect.warehouse_type(),
                close_error
            );
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialects::ErrorClassification;
    use crate::error::DqScanError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct CountingSession {
        counters: Arc<Counters>,
        fail_close: bool,
    }

    #[async_trait]
    impl Session for CountingSession {
        fn warehouse_type(&self) -> WarehouseType {
            WarehouseType::Postgres
        }

        async fn query(&mut self, sql: &str) -> Result<QueryResult> {
            if sql.contains("boom") {
                return Err(DqScanError::query_failed(
                    "statement failed",
                    std::io::Error::other("boom"),
                ));
            }
            Ok(QueryResult {
                columns: vec![ColumnDescriptor {
                    name: "one".to_string(),
                    native_type: NativeType::Code(23),
                }],
                rows: vec![vec![serde_json::json!(1)]],
            })
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(DqScanError::query_failed(
                    "close failed",
                    std::io::Error::other("close"),
                ));
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct CountingDialect {
        counters: Arc<Counters>,
        fail_close: bool,
    }

    #[async_trait]
    impl Dialect for CountingDialect {
        fn warehouse_type(&self) -> WarehouseType {
            WarehouseType::Postgres
        }

        async fn open_connection(&self) -> Result<Box<dyn Session>> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession {
                counters: Arc::clone(&self.counters),
                fail_close: self.fail_close,
            }))
        }

        fn qualify_table_name(&self, name: &str) -> String {
            name.to_string()
        }

        fn qualify_column_name(&self, name: &str) -> String {
            name.to_string()
        }

        fn tables_metadata_query(&self, _limit: Option<u32>, _filter: Option<&str>) -> String {
            String::new()
        }

        fn columns_metadata_query(&self, table_name: &str) -> Result<String> {
            Ok(table_name.to_string())
        }

        fn expr_regexp_like(&self, expr: &str, _pattern: &str) -> String {
            expr.to_string()
        }

        fn expr_cast_text_to_number(&self, quoted_column: &str, _format: &str) -> Result<String> {
            Ok(quoted_column.to_string())
        }

        fn resolve_type_name(&self, _native: &NativeType) -> &'static str {
            crate::dialects::UNKNOWN_TYPE
        }
    }

    fn dialect(fail_close: bool) -> CountingDialect {
        CountingDialect {
            counters: Arc::new(Counters::default()),
            fail_close,
        }
    }

    #[tokio::test]
    async fn test_with_session_closes_after_success() {
        let dialect = dialect(false);
        let result = with_session(&dialect, |session| {
            Box::pin(async move { session.query("SELECT 1").await })
        })
        .await
        .unwrap();

        assert_eq!(result.column_values("one").collect::<Vec<_>>(), [&serde_json::json!(1)]);
        assert_eq!(dialect.counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(dialect.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_session_closes_after_failure() {
        let dialect = dialect(false);
        let result = with_session(&dialect, |session| {
            Box::pin(async move { session.query("SELECT boom").await })
        })
        .await;

        assert!(matches!(result, Err(DqScanError::QueryExecution { .. })));
        assert_eq!(dialect.counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_work_error_wins_over_close_error() {
        let dialect = dialect(true);
        let result = with_session(&dialect, |session| {
            Box::pin(async move { session.query("SELECT boom").await })
        })
        .await;

        let error = result.unwrap_err();
        assert!(error.to_string().contains("statement failed"));
        assert_eq!(error.classification(), None::<ErrorClassification>);
    }

    #[tokio::test]
    async fn test_close_error_surfaces_after_success() {
        let dialect = dialect(true);
        let result = with_session(&dialect, |session| {
            Box::pin(async move { session.query("SELECT 1").await })
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("close failed"));
    }

    #[test]
    fn test_column_lookup() {
        let result = QueryResult {
            columns: vec![
                ColumnDescriptor {
                    name: "a".to_string(),
                    native_type: NativeType::Code(25),
                },
                ColumnDescriptor {
                    name: "b".to_string(),
                    native_type: NativeType::Code(23),
                },
            ],
            rows: vec![
                vec![serde_json::json!("x"), serde_json::json!(1)],
                vec![serde_json::json!("y"), serde_json::json!(2)],
            ],
        };
        assert_eq!(result.column_index("b"), Some(1));
        assert_eq!(
            result.column_values("b").collect::<Vec<_>>(),
            [&serde_json::json!(1), &serde_json::json!(2)]
        );
        assert_eq!(result.column_values("missing").count(), 0);
    }
}
