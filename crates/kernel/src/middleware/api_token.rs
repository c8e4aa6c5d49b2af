//! API token authentication middleware.
//!
//! Checks for `Authorization: Bearer <token>` headers and, if valid,
//! attaches the owning account to the request as a [`TokenPrincipal`].

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::permissions::TokenPrincipal;
use crate::state::AppState;

/// Middleware that authenticates via Bearer token.
///
/// - Valid token -> request gets a `TokenPrincipal` extension
/// - Unknown token -> 401 JSON error
/// - No header -> passes through (session auth may still work)
pub async fn authenticate_api_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let raw_token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(raw_token) = raw_token else {
        return next.run(request).await;
    };

    let Some(account) = state.accounts().find_by_token(raw_token) else {
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({
                "success": false,
                "code": "rest_invalid_token",
                "message": "Invalid or expired API token",
            })),
        )
            .into_response();
    };

    debug!(account = %account.name, "request authenticated by API token");
    let principal = TokenPrincipal(account.name.clone());
    request.extensions_mut().insert(principal);

    next.run(request).await
}
