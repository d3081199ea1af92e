use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;

use crate::errors::{SnowflakeError, SnowflakeResult};
use crate::response::StatementResponse;
use crate::SnowflakeClient;

/// The two-phase statements API: submit a batch, then poll a statement by handle.
///
/// Every query function in this crate is written against this trait, so the
/// HTTP client can be swapped for an in-memory warehouse in tests.
pub trait StatementApi: Send + Sync {
    /// Submit one or more statements as a single request
    fn submit(
        &self,
        statements: &[String],
    ) -> impl Future<Output = SnowflakeResult<StatementResponse>> + Send;

    /// Fetch the result of one statement by its handle
    fn poll(&self, handle: &str) -> impl Future<Output = SnowflakeResult<StatementResponse>> + Send;

    /// How long to wait between polls of a statement that is still running
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(500)
    }

    /// How many polls to make before giving up on a running statement
    fn max_polls(&self) -> usize {
        20
    }
}

/// Run a batch and return the result of statement `index`.
///
/// The submit response is used as-is when it already carries the rows of a
/// single statement; otherwise the handle of interest is polled until the
/// statement has finished.
pub async fn fetch<A: StatementApi>(
    api: &A,
    statements: &[String],
    index: usize,
) -> SnowflakeResult<StatementResponse> {
    let submitted = api.submit(statements).await?;
    log::debug!(
        "Submitted {} statement(s): {}: {}",
        statements.len(),
        submitted.code,
        submitted.message
    );
    if statements.len() == 1 && submitted.has_inline_rows() {
        return Ok(submitted);
    }
    let handle = submitted
        .handle_for(index)
        .ok_or(SnowflakeError::MissingHandle(index))?
        .to_owned();

    for attempt in 0..api.max_polls() {
        if attempt > 0 {
            tokio::time::sleep(api.poll_interval()).await;
        }
        let response = api.poll(&handle).await?;
        if !response.in_progress {
            return Ok(response);
        }
        log::debug!("Statement {handle} still running (poll {})", attempt + 1);
    }
    Err(SnowflakeError::StillRunning(handle))
}

/// Run a single statement and return its result
pub async fn query<A: StatementApi>(api: &A, sql: String) -> SnowflakeResult<StatementResponse> {
    fetch(api, &[sql], 0).await
}

/// Run a single statement whose result set is not needed
pub async fn execute<A: StatementApi>(api: &A, sql: String) -> SnowflakeResult<()> {
    let submitted = api.submit(&[sql]).await?;
    log::debug!("Executed statement: {}: {}", submitted.code, submitted.message);
    Ok(())
}

impl StatementApi for SnowflakeClient {
    async fn submit(&self, statements: &[String]) -> SnowflakeResult<StatementResponse> {
        let wire = self.wire_statement(statements);
        log::debug!("Sending statement: {}", wire.statement);
        let request = self
            .http
            .post(self.statements_url())
            .query(&[
                ("nullable", "true".to_owned()),
                ("requestId", uuid::Uuid::new_v4().to_string()),
            ])
            .json(&wire);
        self.statement_response(request).await
    }

    async fn poll(&self, handle: &str) -> SnowflakeResult<StatementResponse> {
        let url = format!("{}/{}", self.statements_url(), handle);
        self.statement_response(self.http.get(url)).await
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn max_polls(&self) -> usize {
        self.max_polls
    }
}

impl SnowflakeClient {
    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.account_url)
    }

    fn wire_statement(&self, statements: &[String]) -> WireStatement {
        let parameters = (statements.len() > 1).then(|| WireParameters {
            multi_statement_count: statements.len(),
        });
        WireStatement {
            statement: statements.concat(),
            timeout: Some(self.timeout_seconds),
            database: self.database.clone(),
            warehouse: self.warehouse.clone(),
            role: self.role.clone(),
            parameters,
        }
    }

    async fn statement_response(
        &self,
        request: reqwest::RequestBuilder,
    ) -> SnowflakeResult<StatementResponse> {
        let (status, body) = self.send(request).await?;
        let mut response: StatementResponse = serde_json::from_slice(&body)?;
        response.in_progress = status == StatusCode::ACCEPTED;
        Ok(response)
    }

    /// Send a request and drain its body.
    ///
    /// The body is read to the end on every path so the connection goes back
    /// to the pool; non-2xx statuses become typed errors.
    pub(crate) async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> SnowflakeResult<(StatusCode, Vec<u8>)> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        if status.is_success() {
            Ok((status, body))
        } else {
            Err(SnowflakeError::from_status(status.as_u16(), &body))
        }
    }
}

#[derive(Serialize, Debug, Clone)]
struct WireStatement {
    statement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<WireParameters>,
}

#[derive(Serialize, Debug, Clone)]
struct WireParameters {
    #[serde(rename = "MULTI_STATEMENT_COUNT")]
    multi_statement_count: usize,
}
