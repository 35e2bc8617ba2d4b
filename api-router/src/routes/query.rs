use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use retrieval_pipeline::{dispatch_query, extract_query, parse_body};
use serde::Serialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Serialize, Debug)]
struct QueryResponse {
    result: String,
}

pub async fn query(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body = parse_body(&body)?;
    let query = extract_query(&body)?;

    let result = dispatch_query(&state.agent, query, state.query_timeout).await?;

    Ok(Json(QueryResponse { result }))
}
