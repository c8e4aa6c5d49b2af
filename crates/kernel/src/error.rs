//! Application error types.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Request-level errors. Anything raised here rejects the whole request
/// before a batch starts.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    /// No principal on the request.
    #[error("You are not currently logged in.")]
    Unauthorized,

    /// Principal lacks the capability.
    #[error("Sorry, you are not allowed to do that.")]
    Forbidden,

    /// Missing or invalid anti-forgery nonce.
    #[error("Cookie check failed")]
    InvalidNonce,

    #[error("{0}")]
    Validation(String),
}

impl AppError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::NotFound => "rest_no_route",
            AppError::Unauthorized => "rest_not_logged_in",
            AppError::Forbidden => "rest_forbidden",
            AppError::InvalidNonce => "rest_cookie_invalid_nonce",
            AppError::Validation(_) => "rest_invalid_param",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::InvalidNonce => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<crate::registry::RegistryError> for AppError {
    fn from(err: crate::registry::RegistryError) -> Self {
        AppError::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.code(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
