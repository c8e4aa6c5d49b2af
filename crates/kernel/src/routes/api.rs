//! JSON batch API.
//!
//! Every state-changing route requires the `install_plugins` capability and,
//! for cookie sessions, a `wp_rest` nonce in the `X-WP-Nonce` header. Reads
//! only need the capability.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::batch::{BatchOptions, summarize_install};
use crate::error::{AppError, AppResult};
use crate::nonce::{NONCE_HEADER, NonceScope};
use crate::permissions::{Capability, NonceRequirement, RequestAuth};
use crate::report::{get_status, list_installed};
use crate::state::AppState;

/// Version reported by `/status`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Body of `/install`.
#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    pub plugins: Vec<String>,
    #[serde(default)]
    pub activate: bool,
}

/// Body of `/plugins-status` and `/deactivate-delete`.
#[derive(Debug, Deserialize)]
pub struct PluginsRequest {
    pub plugins: Vec<String>,
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/install", post(install))
        .route("/status", get(status))
        .route("/plugins-status", post(plugins_status))
        .route("/installed-plugins", get(installed_plugins))
        .route("/deactivate-delete", post(deactivate_delete))
}

/// MySQL-style timestamp attached to install responses.
pub fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Reject batches over the configured size.
pub fn check_batch_size(state: &AppState, plugins: &[String]) -> AppResult<()> {
    let max = state.config().max_batch_size;
    if plugins.len() > max {
        return Err(AppError::Validation(format!(
            "Too many plugins in one request: {} (maximum {max})",
            plugins.len()
        )));
    }
    Ok(())
}

fn rest_nonce(headers: &HeaderMap) -> NonceRequirement<'_> {
    NonceRequirement::Required {
        scope: NonceScope::Rest,
        submitted: headers.get(NONCE_HEADER).and_then(|v| v.to_str().ok()),
    }
}

/// Run an install batch and build the response body shared by both transports.
pub async fn run_install(state: &AppState, plugins: &[String], activate: bool) -> Value {
    let options = BatchOptions {
        suppress_maintenance: state.config().suppress_maintenance,
    };
    let results = state
        .orchestrator()
        .install_batch(plugins, activate, options)
        .await;
    let report = summarize_install(&results);

    info!(
        total = report.summary.total,
        installed = report.summary.installed,
        errors = report.summary.errors,
        "install response built"
    );

    json!({
        "success": true,
        "installed": report.installed,
        "errors": report.errors,
        "summary": report.summary,
        "results": results,
        "timestamp": timestamp(),
    })
}

/// POST /install
async fn install(
    State(state): State<AppState>,
    auth: RequestAuth,
    headers: HeaderMap,
    payload: Result<Json<InstallRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let principal = auth
        .authorize(&state, Capability::InstallPlugins, rest_nonce(&headers))
        .await?;
    let Json(request) = payload?;
    check_batch_size(&state, &request.plugins)?;

    info!(
        account = %principal.account.name,
        count = request.plugins.len(),
        activate = request.activate,
        "install requested"
    );

    Ok(Json(
        run_install(&state, &request.plugins, request.activate).await,
    ))
}

/// GET /status
async fn status(State(state): State<AppState>, auth: RequestAuth) -> AppResult<Json<Value>> {
    let principal = auth
        .authorize(&state, Capability::InstallPlugins, NonceRequirement::NotRequired)
        .await?;
    let account = &principal.account;

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "version": VERSION,
        "rest_enabled": true,
        "capabilities": {
            "install_plugins": account.has_capability(Capability::InstallPlugins),
            "activate_plugins": account.has_capability(Capability::ActivatePlugins),
            "update_plugins": account.has_capability(Capability::UpdatePlugins),
            "delete_plugins": account.has_capability(Capability::DeletePlugins),
        },
        "hostname": hostname,
        "platform": std::env::consts::OS,
        "max_execution_time": state.config().request_timeout.as_secs(),
        "max_batch_size": state.config().max_batch_size,
    })))
}

/// POST /plugins-status
async fn plugins_status(
    State(state): State<AppState>,
    auth: RequestAuth,
    headers: HeaderMap,
    payload: Result<Json<PluginsRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    auth.authorize(&state, Capability::InstallPlugins, rest_nonce(&headers))
        .await?;
    let Json(request) = payload?;
    check_batch_size(&state, &request.plugins)?;

    let plugins = get_status(state.registry().as_ref(), &request.plugins).await?;

    Ok(Json(json!({
        "success": true,
        "plugins": plugins,
    })))
}

/// GET /installed-plugins
async fn installed_plugins(
    State(state): State<AppState>,
    auth: RequestAuth,
) -> AppResult<Json<Value>> {
    auth.authorize(&state, Capability::InstallPlugins, NonceRequirement::NotRequired)
        .await?;

    let plugins = list_installed(state.registry().as_ref()).await?;

    Ok(Json(json!({
        "success": true,
        "plugins": plugins,
    })))
}

/// POST /deactivate-delete
async fn deactivate_delete(
    State(state): State<AppState>,
    auth: RequestAuth,
    headers: HeaderMap,
    payload: Result<Json<PluginsRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let principal = auth
        .authorize(&state, Capability::InstallPlugins, rest_nonce(&headers))
        .await?;
    let Json(request) = payload?;
    check_batch_size(&state, &request.plugins)?;

    info!(
        account = %principal.account.name,
        count = request.plugins.len(),
        "deactivate+delete requested"
    );

    let report = state
        .orchestrator()
        .deactivate_and_delete(&request.plugins)
        .await;

    Ok(Json(json!({
        "success": true,
        "results": report.results,
        "summary": report.summary,
    })))
}
