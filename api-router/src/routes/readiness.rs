use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 once the agent is built, else 503. Never starts a build.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let agent = state.agent.state();

    if state.agent.is_ready() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "agent": agent }
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "agent": agent }
            })),
        )
    }
}
