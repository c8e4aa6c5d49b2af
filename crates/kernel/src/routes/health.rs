//! Health check endpoint.
//!
//! Returns 200 OK if the package registry can be read,
//! 503 Service Unavailable otherwise.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    registry: bool,
    packages: usize,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.registry().snapshot().await;

    let (status_code, response) = match snapshot {
        Ok(packages) => (
            StatusCode::OK,
            HealthResponse {
                status: "healthy",
                registry: true,
                packages: packages.len(),
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: registry unreadable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthResponse {
                    status: "unhealthy",
                    registry: false,
                    packages: 0,
                },
            )
        }
    };

    (status_code, Json(response))
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
