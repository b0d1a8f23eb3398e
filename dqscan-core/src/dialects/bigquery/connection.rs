//! BigQuery sessions over the REST jobs API.

use super::BigQueryDialect;
use crate::dialects::{
    ColumnDescriptor, Dialect, NativeType, QueryResult, Session, WarehouseType,
};
use crate::error::{DqScanError, Result};
use async_trait::async_trait;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::get_query_results_response::GetQueryResultsResponse;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::QueryResponse;
use gcp_bigquery_client::model::table_row::TableRow;
use gcp_bigquery_client::model::table_schema::TableSchema;
use gcp_bigquery_client::yup_oauth2::ServiceAccountKey;
use serde_json::Value;

impl BigQueryDialect {
    fn connection_error<E>(&self, error: E) -> DqScanError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let classification = self.classify_exception(&error);
        tracing::warn!(
            "BigQuery connection to project {} failed ({}): {}",
            self.project_id,
            classification,
            error
        );
        DqScanError::connection_failed(
            WarehouseType::BigQuery,
            classification,
            format!("project {}", self.project_id),
            error,
        )
    }

    async fn authenticate(&self) -> Result<Client> {
        let key: ServiceAccountKey = serde_json::from_str(self.account_info.expose())
            .map_err(|e| self.connection_error(e))?;
        let client = Client::from_service_account_key(key, false)
            .await
            .map_err(|e| self.connection_error(e))?;
        client
            .job()
            .query(&self.project_id, QueryRequest::new("SELECT 1".to_string()))
            .await
            .map_err(|e| self.connection_error(e))?;
        Ok(client)
    }

    /// Builds an authenticated client and verifies it with `SELECT 1`.
    pub(super) async fn connect(&self) -> Result<BigQuerySession> {
        tracing::debug!("Connecting to BigQuery project {}", self.project_id);

        let client = match self.connection_timeout {
            Some(limit) => tokio::time::timeout(limit, self.authenticate())
                .await
                .map_err(|_| {
                    self.connection_error(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("timeout expired after {}s", limit.as_secs()),
                    ))
                })??,
            None => self.authenticate().await?,
        };

        tracing::debug!("Connected to BigQuery project {}", self.project_id);
        Ok(BigQuerySession {
            client,
            project_id: self.project_id.clone(),
        })
    }
}

/// Live BigQuery session.
pub(super) struct BigQuerySession {
    client: Client,
    project_id: String,
}

/// One response of `jobs.query` or `jobs.getQueryResults`.
#[derive(Debug)]
struct ResultPage {
    schema: Option<TableSchema>,
    rows: Vec<TableRow>,
    job_complete: bool,
    page_token: Option<String>,
}

impl ResultPage {
    /// Whether the job is still running or more pages remain.
    fn needs_more(&self) -> bool {
        !self.job_complete || self.page_token.is_some()
    }
}

impl From<QueryResponse> for ResultPage {
    fn from(response: QueryResponse) -> Self {
        Self {
            schema: response.schema,
            rows: response.rows.unwrap_or_default(),
            job_complete: response.job_complete.unwrap_or(false),
            page_token: response.page_token,
        }
    }
}

impl From<GetQueryResultsResponse> for ResultPage {
    fn from(response: GetQueryResultsResponse) -> Self {
        Self {
            schema: response.schema,
            rows: response.rows.unwrap_or_default(),
            job_complete: response.job_complete.unwrap_or(false),
            page_token: response.page_token,
        }
    }
}

/// Id of the job to poll for the rest of an incomplete result.
fn pending_job_id(job: Option<&JobReference>) -> Result<String> {
    job.and_then(|job| job.job_id.clone()).ok_or_else(|| {
        DqScanError::query_failed(
            "BigQuery result is incomplete",
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "response has more rows but no job reference",
            ),
        )
    })
}

/// Rows gathered across every page of one query.
#[derive(Debug, Default)]
struct ResultPages {
    schema: Option<TableSchema>,
    rows: Vec<TableRow>,
}

impl ResultPages {
    fn push(&mut self, page: ResultPage) {
        if self.schema.is_none() {
            self.schema = page.schema;
        }
        self.rows.extend(page.rows);
    }

    /// Flattens the collected pages into columns and rows.
    ///
    /// Cell values are kept as the API renders them, which is a string for
    /// every scalar type.
    fn into_result(self) -> QueryResult {
        let columns: Vec<ColumnDescriptor> = self
            .schema
            .and_then(|schema| schema.fields)
            .unwrap_or_default()
            .into_iter()
            .map(|field| {
                let type_name = match serde_json::to_value(&field.r#type) {
                    Ok(Value::String(name)) => name,
                    _ => format!("{:?}", field.r#type),
                };
                ColumnDescriptor {
                    name: field.name,
                    native_type: NativeType::Name(type_name),
                }
            })
            .collect();

        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                let mut values: Vec<Value> = row
                    .columns
                    .unwrap_or_default()
                    .into_iter()
                    .map(|cell| cell.value.unwrap_or(Value::Null))
                    .collect();
                values.resize(columns.len(), Value::Null);
                values
            })
            .collect();

        QueryResult { columns, rows }
    }
}

#[async_trait]
impl Session for BigQuerySession {
    fn warehouse_type(&self) -> WarehouseType {
        WarehouseType::BigQuery
    }

    /// Runs a query and collects every page of its result.
    ///
    /// A job that has not finished within the first response is polled with
    /// `getQueryResults` until it completes.
    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let response = self
            .client
            .job()
            .query(&self.project_id, QueryRequest::new(sql.to_string()))
            .await
            .map_err(|e| DqScanError::query_failed("BigQuery query failed", e))?;
        let job = response.job_reference.clone();
        let mut page = ResultPage::from(response);

        let mut pages = ResultPages::default();
        loop {
            let needs_more = page.needs_more();
            let page_token = page.page_token.clone();
            pages.push(page);
            if !needs_more {
                break;
            }

            let job_id = pending_job_id(job.as_ref())?;
            tracing::trace!(
                "Fetching more BigQuery results for job {} ({} rows so far)",
                job_id,
                pages.rows.len()
            );
            let parameters = GetQueryResultsParameters {
                page_token,
                location: job.as_ref().and_then(|job| job.location.clone()),
                // server-side wait per poll, in milliseconds
                timeout_ms: Some(10_000),
                ..Default::default()
            };
            let response = self
                .client
                .job()
                .get_query_results(&self.project_id, &job_id, parameters)
                .await
                .map_err(|e| DqScanError::query_failed("BigQuery result fetch failed", e))?;
            page = ResultPage::from(response);
        }

        Ok(pages.into_result())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::trace!("Releasing BigQuery client for project {}", self.project_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: Value) -> QueryResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_complete_response_flattens_rows() {
        let page = ResultPage::from(response(json!({
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "table_name", "type": "STRING"},
                {"name": "row_count", "type": "INTEGER"}
            ]},
            "rows": [
                {"f": [{"v": "orders"}, {"v": "12"}]},
                {"f": [{"v": "customers"}]}
            ]
        })));
        assert!(!page.needs_more());

        let mut pages = ResultPages::default();
        pages.push(page);
        let result = pages.into_result();

        let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["table_name", "row_count"]);
        assert_eq!(result.columns[1].native_type, NativeType::from("INTEGER"));
        assert_eq!(result.rows[0], [json!("orders"), json!("12")]);
        assert_eq!(result.rows[1], [json!("customers"), Value::Null]);
    }

    #[test]
    fn test_unfinished_job_needs_more() {
        let page = ResultPage::from(response(json!({
            "jobComplete": false,
            "jobReference": {"projectId": "p", "jobId": "job_1", "location": "EU"}
        })));
        assert!(page.needs_more());
        assert!(page.rows.is_empty());

        let missing = ResultPage::from(response(json!({})));
        assert!(missing.needs_more());
    }

    #[test]
    fn test_paged_response_needs_more() {
        let page = ResultPage::from(response(json!({
            "jobComplete": true,
            "pageToken": "next",
            "rows": [{"f": [{"v": "1"}]}]
        })));
        assert!(page.needs_more());
        assert_eq!(page.page_token.as_deref(), Some("next"));
    }

    #[test]
    fn test_pages_are_concatenated_under_the_first_schema() {
        let mut pages = ResultPages::default();
        pages.push(ResultPage::from(response(json!({
            "jobComplete": true,
            "pageToken": "next",
            "schema": {"fields": [{"name": "n", "type": "INTEGER"}]},
            "rows": [{"f": [{"v": "1"}]}]
        }))));
        pages.push(ResultPage::from(response(json!({
            "jobComplete": true,
            "rows": [{"f": [{"v": "2"}]}, {"f": [{"v": "3"}]}]
        }))));

        let result = pages.into_result();
        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.rows, [[json!("1")], [json!("2")], [json!("3")]]);
    }

    #[test]
    fn test_incomplete_result_without_job_is_an_error() {
        let error = pending_job_id(None).unwrap_err();
        assert!(matches!(error, DqScanError::QueryExecution { .. }));

        let job: JobReference = serde_json::from_value(json!({"jobId": "job_1"})).unwrap();
        assert_eq!(pending_job_id(Some(&job)).unwrap(), "job_1");
    }
}
