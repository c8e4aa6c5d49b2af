//! Form-encoded fallback transport.
//!
//! Clients that cannot reach the JSON routes post an `action` plus the same
//! data as form fields to `/ajax`. Responses use the `{success, data}`
//! envelope; on failure `data` is a short human-readable string.

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::api::{VERSION, check_batch_size, run_install};
use crate::error::AppError;
use crate::nonce::{NonceScope, issue_nonce};
use crate::permissions::{Capability, NonceRequirement, RequestAuth};
use crate::state::AppState;

const ACTION_INSTALL: &str = "install_packages";
const ACTION_STATUS: &str = "get_status";

/// Form fields accepted by `/ajax`.
#[derive(Debug, Default, Deserialize)]
pub struct AjaxForm {
    pub action: String,
    #[serde(default)]
    pub nonce: Option<String>,
    /// JSON-encoded array of slugs.
    #[serde(default)]
    pub plugins: Option<String>,
    /// `"1"` to activate after install.
    #[serde(default)]
    pub activate: Option<String>,
}

/// Failure in the `{success: false, data}` envelope.
#[derive(Debug)]
pub struct AjaxError(AppError);

impl From<AppError> for AjaxError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AjaxError {
    fn into_response(self) -> Response {
        let message = match &self.0 {
            AppError::Unauthorized | AppError::Forbidden => "Insufficient permissions",
            AppError::InvalidNonce => "Invalid security token",
            AppError::Validation(_) => "Invalid plugin data",
            AppError::NotFound => "Unknown action",
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "Internal server error"
            }
        };
        let body = json!({ "success": false, "data": message });
        (self.0.status(), Json(body)).into_response()
    }
}

/// Create the AJAX router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ajax", get(ajax_get).post(ajax_post))
}

/// Decode the `plugins` field.
pub fn parse_plugins(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let raw = raw.ok_or_else(|| AppError::Validation("missing plugins".to_string()))?;
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|e| AppError::Validation(format!("plugins must be a JSON array of strings: {e}")))
}

async fn dispatch(state: &AppState, auth: &RequestAuth, form: AjaxForm) -> Result<Json<Value>, AjaxError> {
    debug!(action = %form.action, "ajax request");
    match form.action.as_str() {
        ACTION_INSTALL => install(state, auth, &form).await,
        ACTION_STATUS => status(state, auth).await,
        _ => Err(AppError::NotFound.into()),
    }
}

/// POST /ajax
async fn ajax_post(
    State(state): State<AppState>,
    auth: RequestAuth,
    form: Result<Form<AjaxForm>, FormRejection>,
) -> Result<Json<Value>, AjaxError> {
    let Form(form) = form.map_err(|e| AppError::Validation(e.body_text()))?;
    dispatch(&state, &auth, form).await
}

/// GET /ajax
async fn ajax_get(
    State(state): State<AppState>,
    auth: RequestAuth,
    query: Result<Query<AjaxForm>, QueryRejection>,
) -> Result<Json<Value>, AjaxError> {
    let Query(form) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    if form.action == ACTION_INSTALL {
        // State changes only over POST.
        return Err(AppError::NotFound.into());
    }
    dispatch(&state, &auth, form).await
}

async fn install(state: &AppState, auth: &RequestAuth, form: &AjaxForm) -> Result<Json<Value>, AjaxError> {
    let nonce = NonceRequirement::Required {
        scope: NonceScope::Ajax,
        submitted: form.nonce.as_deref(),
    };
    let principal = auth
        .authorize(state, Capability::InstallPlugins, nonce)
        .await?;

    let plugins = parse_plugins(form.plugins.as_deref())?;
    check_batch_size(state, &plugins)?;
    let activate = form.activate.as_deref() == Some("1");

    info!(
        account = %principal.account.name,
        count = plugins.len(),
        activate,
        "install requested over ajax"
    );

    let mut body = run_install(state, &plugins, activate).await;
    Ok(Json(json!({
        "success": true,
        "data": {
            "results": body["results"].take(),
            "timestamp": body["timestamp"].take(),
        },
    })))
}

async fn status(state: &AppState, auth: &RequestAuth) -> Result<Json<Value>, AjaxError> {
    auth.authorize(state, Capability::InstallPlugins, NonceRequirement::NotRequired)
        .await?;

    let nonce = issue_nonce(&auth.session, NonceScope::Ajax)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "version": VERSION,
            "ajax_enabled": true,
            "nonce": nonce,
        },
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn plugins_field_must_be_json_array() {
        assert_eq!(
            parse_plugins(Some(r#"["akismet","hello-dolly"]"#)).unwrap(),
            vec!["akismet", "hello-dolly"]
        );
        assert!(parse_plugins(Some("akismet")).is_err());
        assert!(parse_plugins(Some(r#"{"a":1}"#)).is_err());
        assert!(parse_plugins(None).is_err());
    }

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = AjaxError(err).into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn failures_use_legacy_messages() {
        let (status, body) = render(AppError::InvalidNonce).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"success": false, "data": "Invalid security token"}));

        let (status, body) = render(AppError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["data"], "Insufficient permissions");

        let (status, body) = render(AppError::Validation("x".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"], "Invalid plugin data");
    }
}
