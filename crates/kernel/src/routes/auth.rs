//! Login, logout and nonce routes.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::nonce::{NonceScope, clear_nonces, issue_nonce};
use crate::permissions::{Capability, NonceRequirement, RequestAuth, SESSION_ACCOUNT};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    /// REST nonce for the new session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Typed login error for explicit status code mapping.
#[derive(Debug)]
enum LoginError {
    /// Wrong username or password (401).
    InvalidCredentials,
    /// Malformed body (400).
    BadRequest(String),
    /// Session store failure (500).
    Internal,
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            LoginError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid username or password".to_string(),
            ),
            LoginError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "rest_invalid_param", msg),
            LoginError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error".to_string(),
            ),
        };
        (
            status,
            Json(json!({ "success": false, "code": code, "message": message })),
        )
            .into_response()
    }
}

/// POST /user/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, LoginError> {
    let Json(request) = payload.map_err(|e| LoginError::BadRequest(e.body_text()))?;

    let Some(account) = state.accounts().find_by_name(&request.username) else {
        warn!(username = %request.username, "login failed: unknown account");
        return Err(LoginError::InvalidCredentials);
    };

    if !account.verify_password(&request.password) {
        warn!(username = %request.username, "login failed: bad password");
        return Err(LoginError::InvalidCredentials);
    }

    // New session id on privilege change.
    session.cycle_id().await.map_err(|e| {
        tracing::error!(error = %e, "failed to cycle session id");
        LoginError::Internal
    })?;
    session
        .insert(SESSION_ACCOUNT, &account.name)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to store account in session");
            LoginError::Internal
        })?;

    let nonce = if account.has_capability(Capability::InstallPlugins) {
        Some(issue_nonce(&session, NonceScope::Rest).await.map_err(|e| {
            tracing::error!(error = %e, "failed to issue nonce");
            LoginError::Internal
        })?)
    } else {
        None
    };

    info!(account = %account.name, "account logged in");
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        nonce,
    }))
}

/// POST /user/logout
async fn logout(session: Session) -> AppResult<Json<LoginResponse>> {
    let account: Option<String> = session.get(SESSION_ACCOUNT).await.ok().flatten();

    clear_nonces(&session).await?;
    session
        .delete()
        .await
        .map_err(|e| anyhow::anyhow!("failed to delete session: {e}"))?;

    if let Some(name) = account {
        info!(account = %name, "account logged out");
    }

    Ok(Json(LoginResponse {
        success: true,
        message: "Logout successful".to_string(),
        nonce: None,
    }))
}

/// GET /nonce
///
/// Fresh REST and AJAX nonces for the current session.
async fn nonce(State(state): State<AppState>, auth: RequestAuth) -> AppResult<Json<Value>> {
    auth.authorize(&state, Capability::InstallPlugins, NonceRequirement::NotRequired)
        .await?;

    let rest = issue_nonce(&auth.session, NonceScope::Rest)
        .await
        .map_err(AppError::Internal)?;
    let ajax = issue_nonce(&auth.session, NonceScope::Ajax)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({
        "success": true,
        "nonce": rest,
        "ajax_nonce": ajax,
    })))
}

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/nonce", get(nonce))
}
