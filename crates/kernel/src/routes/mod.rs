//! HTTP route handlers.

pub mod ajax;
pub mod api;
pub mod auth;
pub mod health;
pub mod metrics;

use anyhow::Result;
use axum::Router;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::session::{parse_same_site, with_sessions};
use crate::state::AppState;

/// All routes with authentication and metrics middleware, without sessions.
pub fn router(state: AppState) -> Router {
    // Layers run bottom-up on the way in: api_token -> metrics -> handler.
    Router::new()
        .merge(api::router())
        .merge(ajax::router())
        .merge(auth::router())
        .merge(health::router())
        .merge(metrics::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::track_metrics,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::authenticate_api_token,
        ))
        .with_state(state)
}

/// The complete application: routes, sessions, timeout, CORS and tracing.
pub async fn app(state: AppState) -> Result<Router> {
    let config = state.config().clone();
    let router = router(state);

    let router = with_sessions(
        router,
        config.redis_url.as_deref(),
        parse_same_site(&config.cookie_same_site),
        config.cookie_secure,
    )
    .await?;

    // TraceLayer -> CORS -> timeout -> session -> routes
    Ok(router
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http()))
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        // Credentialed CORS cannot use wildcard headers.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderName::from_static("x-wp-nonce"),
            ])
            .allow_credentials(true)
    }
}
