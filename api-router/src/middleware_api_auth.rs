use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use common::{auth::authorize, error::AppError};
use tracing::warn;

use crate::{api_state::ApiState, error::ApiError};

pub async fn api_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = authorize(header, &state.auth_token) {
        warn!(reason = %e, path = %request.uri().path(), "Rejected request");
        return Err(AppError::from(e).into());
    }

    Ok(next.run(request).await)
}
