use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::AppState;

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Gate for the `/api/*` ledger routes. An empty configured token never matches.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.dashboard_token.as_str();
    let accepted = !expected.is_empty() && presented_token(&headers) == Some(expected);
    if accepted {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "Rejected ledger API request");
    let body = Json(json!({ "error": "missing or invalid bearer token" }));
    (StatusCode::UNAUTHORIZED, body).into_response()
}
