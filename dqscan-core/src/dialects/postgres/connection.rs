//! PostgreSQL sessions over a single sqlx connection.
//!
//! Sessions are plain connections rather than pool checkouts: each scan unit
//! owns its session outright and closing it closes the socket.

use super::{APPLICATION_NAME, PostgresDialect};
use crate::dialects::{
    ColumnDescriptor, Dialect, NativeType, QueryResult, Session, WarehouseType,
};
use crate::error::{DqScanError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Column, Connection, Executor, Statement, TypeInfo};

impl PostgresDialect {
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose())
            .database(&self.database)
            .application_name(APPLICATION_NAME)
            .options([("search_path", self.schema.as_str())])
    }

    fn connection_error<E>(&self, error: E) -> DqScanError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let classification = self.classify_exception(&error);
        tracing::warn!(
            "PostgreSQL connection to {} failed ({}): {}",
            self.endpoint(),
            classification,
            error
        );
        DqScanError::connection_failed(
            WarehouseType::Postgres,
            classification,
            self.endpoint(),
            error,
        )
    }

    /// Opens and verifies a connection.
    ///
    /// The configured timeout covers both the handshake and the `SELECT 1`
    /// probe. On probe failure the connection is closed before returning.
    pub(super) async fn connect(&self) -> Result<PostgresSession> {
        tracing::debug!("Connecting to PostgreSQL at {}", self.endpoint());

        let establish = async {
            let mut conn = PgConnection::connect_with(&self.connect_options()).await?;
            match sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&mut conn)
                .await
            {
                Ok(_) => Ok::<_, sqlx::Error>(conn),
                Err(probe_error) => {
                    if let Err(close_error) = conn.close().await {
                        tracing::debug!("Closing unverified connection failed: {}", close_error);
                    }
                    Err(probe_error)
                }
            }
        };

        let conn = match self.connection_timeout {
            Some(limit) => match tokio::time::timeout(limit, establish).await {
                Ok(outcome) => outcome.map_err(|e| self.connection_error(e))?,
                Err(_) => {
                    return Err(self.connection_error(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("timeout expired after {}s", limit.as_secs()),
                    )));
                }
            },
            None => establish.await.map_err(|e| self.connection_error(e))?,
        };

        tracing::debug!("Connected to PostgreSQL at {}", self.endpoint());
        Ok(PostgresSession { conn })
    }
}

/// Live PostgreSQL session.
pub(super) struct PostgresSession {
    conn: PgConnection,
}

impl PostgresSession {
    /// Describes the statement's result columns without running it.
    async fn describe(&mut self, sql: &str) -> Result<Vec<ColumnDescriptor>> {
        let statement = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(|e| DqScanError::query_failed("Failed to prepare PostgreSQL statement", e))?;

        Ok(statement
            .columns()
            .iter()
            .map(|column| {
                let type_info = column.type_info();
                let native_type = match type_info.oid() {
                    Some(oid) => NativeType::Code(oid.0),
                    None => NativeType::Name(type_info.name().to_string()),
                };
                ColumnDescriptor {
                    name: column.name().to_string(),
                    native_type,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Session for PostgresSession {
    fn warehouse_type(&self) -> WarehouseType {
        WarehouseType::Postgres
    }

    /// Runs a row-returning statement.
    ///
    /// Rows are fetched as `row_to_json` objects so every column type decodes
    /// to JSON without per-type handling. Result columns sharing a name
    /// collapse to the last one.
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let statement = sql.trim().trim_end_matches(';');
        let columns = self.describe(statement).await?;

        let wrapped = format!("SELECT row_to_json(t.*) FROM ({}) t", statement);
        let objects = sqlx::query_scalar::<_, Value>(&wrapped)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DqScanError::query_failed("PostgreSQL query failed", e))?;

        let rows = objects
            .into_iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|column| object.get(&column.name).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(QueryResult { columns, rows })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let session = *self;
        session
            .conn
            .close()
            .await
            .map_err(|e| DqScanError::query_failed("Failed to close PostgreSQL session", e))
    }
}
