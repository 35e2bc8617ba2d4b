use std::time::Duration;

use common::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{error::Elapsed, timeout_at, Instant};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, instrument};

use crate::bootstrap::AgentHandle;

pub const MISSING_QUERY: &str = "Missing query parameter";
pub const INVALID_JSON: &str = "Invalid JSON in request body";
pub const QUERY_FAILED: &str = "Error processing query";

/// An empty body is treated like `{}`.
pub fn parse_body(raw: &[u8]) -> Result<Value, AppError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    serde_json::from_slice(raw).map_err(|_| AppError::Validation(INVALID_JSON.to_string()))
}

pub fn extract_query(body: &Value) -> Result<String, AppError> {
    body.get("query")
        .and_then(Value::as_str)
        .filter(|query| !query.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(MISSING_QUERY.to_string()))
}

/// Runs one query through the agent, building it first if needed.
///
/// `timeout` bounds agent construction and the query together. The agent call runs in its
/// own task, so an error, a panic, or a stall all come back as an `Err`; the task is aborted
/// when the deadline passes or the caller goes away.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn dispatch_query(
    handle: &AgentHandle,
    query: String,
    timeout: Duration,
) -> Result<String, AppError> {
    let deadline = Instant::now() + timeout;
    let timed_out = |_: Elapsed| AppError::Timeout(timeout.as_secs());

    let agent = timeout_at(deadline, handle.get_or_init())
        .await
        .map_err(timed_out)??;

    info!(query_chars = query.chars().count(), "Processing query");
    debug!(%query, "Query text");

    let task = AbortOnDropHandle::new(tokio::spawn(async move { agent.query(&query).await }));
    let response = timeout_at(deadline, task).await.map_err(timed_out)???;

    let text = response.into_text();
    info!(answer_chars = text.chars().count(), "Query answered");

    Ok(text)
}

/// Result envelope with an explicit status discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryEnvelope {
    Success { result: String },
    Error { error: String },
}

impl QueryEnvelope {
    /// Internal failures are logged here and replaced by a generic message.
    pub fn from_result(result: Result<String, AppError>) -> Self {
        match result {
            Ok(result) => Self::Success { result },
            Err(e) if e.is_client_error() => Self::Error {
                error: match e {
                    AppError::Validation(message) => message,
                    other => other.to_string(),
                },
            },
            Err(e) => {
                error!(error = %e, "Error processing query");
                Self::Error {
                    error: QUERY_FAILED.to_string(),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
