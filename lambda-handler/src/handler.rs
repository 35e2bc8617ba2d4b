use std::{sync::Arc, time::Duration};

use common::{
    auth::{authorize, AuthError},
    error::AppError,
    utils::secrets::SecretSource,
};
use retrieval_pipeline::{dispatch_query, extract_query, parse_body, AgentHandle, QueryEnvelope};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::proxy::{ProxyRequest, ProxyResponse};

const INIT_FAILED: &str = "Failed to initialize agent";

/// Per-execution-context state, reused across warm invocations.
pub struct LambdaState {
    pub secrets: Arc<dyn SecretSource>,
    pub agent: Arc<AgentHandle>,
    pub query_timeout: Duration,
}

impl LambdaState {
    pub fn new(
        secrets: Arc<dyn SecretSource>,
        agent: Arc<AgentHandle>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            secrets,
            agent,
            query_timeout,
        }
    }
}

/// Maps one proxy event to a response. Every failure is rendered, never raised.
///
/// The caller is authenticated before the agent is touched, so rejected requests never
/// pay for agent construction.
#[instrument(skip_all, fields(method = %request.http_method))]
pub async fn handle_event(state: &LambdaState, request: ProxyRequest) -> ProxyResponse {
    info!(path = ?request.path, "Received event");

    if request.http_method.eq_ignore_ascii_case("OPTIONS") {
        return ProxyResponse::empty(200);
    }
    if request.is_health_check() {
        return ProxyResponse::json(200, &json!({"status": "healthy"}));
    }
    if !request.http_method.eq_ignore_ascii_case("POST") {
        return ProxyResponse::error(405, "Method not allowed");
    }

    let expected = match state.secrets.auth_token().await {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "Failed to resolve authentication token");
            return ProxyResponse::error(500, INIT_FAILED);
        }
    };

    if let Err(e) = authorize(request.header("Authorization"), &expected) {
        warn!(reason = %e, "Rejected request");
        let status = match e {
            AuthError::MissingToken => 401,
            AuthError::InvalidToken => 403,
        };
        return ProxyResponse::error(status, &e.to_string());
    }

    let query = match request
        .body_bytes()
        .and_then(|raw| parse_body(&raw))
        .and_then(|body| extract_query(&body))
    {
        Ok(query) => query,
        Err(e) => {
            let message = match e {
                AppError::Validation(message) => message,
                other => other.to_string(),
            };
            return ProxyResponse::error(400, &message);
        }
    };

    match dispatch_query(&state.agent, query, state.query_timeout).await {
        Err(AppError::Initialization(reason)) => {
            error!(%reason, "Initialization error");
            ProxyResponse::error(500, INIT_FAILED)
        }
        result => {
            let envelope = QueryEnvelope::from_result(result);
            let status = if envelope.is_success() { 200 } else { 500 };
            ProxyResponse::json(status, &envelope)
        }
    }
}
