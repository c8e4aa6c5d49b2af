//! Authorization policy.
//!
//! Every entry point, JSON or legacy form transport, goes through
//! [`authorize`]. Principals come either from the session cookie (after
//! `/user/login`) or from an API token validated by the bearer middleware.
//! Only cookie principals need an anti-forgery nonce: a bearer token is not
//! sent by the browser on its own, so it cannot be forged cross-site.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::debug;

use crate::error::AppError;
use crate::models::Account;
use crate::nonce::{NonceScope, verify_nonce};
use crate::state::AppState;

/// Session key for the authenticated account name.
pub const SESSION_ACCOUNT: &str = "account";

/// Operations an account can be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    InstallPlugins,
    ActivatePlugins,
    UpdatePlugins,
    DeletePlugins,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::InstallPlugins,
        Capability::ActivatePlugins,
        Capability::UpdatePlugins,
        Capability::DeletePlugins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::InstallPlugins => "install_plugins",
            Capability::ActivatePlugins => "activate_plugins",
            Capability::UpdatePlugins => "update_plugins",
            Capability::DeletePlugins => "delete_plugins",
        }
    }
}

/// Account authenticated by API token, set as a request extension.
#[derive(Debug, Clone)]
pub struct TokenPrincipal(pub String);

/// How the principal authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    Token,
}

/// Authorized caller.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account: Account,
    pub method: AuthMethod,
}

/// Whether a request must carry a nonce.
#[derive(Debug, Clone, Copy)]
pub enum NonceRequirement<'a> {
    NotRequired,
    Required {
        scope: NonceScope,
        submitted: Option<&'a str>,
    },
}

/// Authentication inputs of a request.
pub struct RequestAuth {
    pub session: Session,
    pub token: Option<TokenPrincipal>,
}

impl FromRequestParts<AppState> for RequestAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(anyhow::anyhow!("session unavailable: {msg}")))?;
        let token = parts.extensions.get::<TokenPrincipal>().cloned();
        Ok(Self { session, token })
    }
}

impl RequestAuth {
    pub async fn authorize(
        &self,
        state: &AppState,
        capability: Capability,
        nonce: NonceRequirement<'_>,
    ) -> Result<Principal, AppError> {
        authorize(state, &self.session, self.token.as_ref(), capability, nonce).await
    }

    /// The authenticated principal, without any capability check.
    pub async fn principal(&self, state: &AppState) -> Result<Principal, AppError> {
        resolve_principal(state, &self.session, self.token.as_ref()).await
    }
}

/// The single authorization policy.
///
/// Order: principal present (401), capability held (403), then nonce for
/// cookie principals when required (403).
pub async fn authorize(
    state: &AppState,
    session: &Session,
    token: Option<&TokenPrincipal>,
    capability: Capability,
    nonce: NonceRequirement<'_>,
) -> Result<Principal, AppError> {
    let principal = resolve_principal(state, session, token).await?;

    if !principal.account.has_capability(capability) {
        debug!(account = %principal.account.name, capability = capability.as_str(), "capability missing");
        return Err(AppError::Forbidden);
    }

    if let NonceRequirement::Required { scope, submitted } = nonce
        && principal.method == AuthMethod::Session
    {
        let submitted = submitted.unwrap_or_default();
        let valid = !submitted.is_empty()
            && verify_nonce(session, scope, submitted)
                .await
                .unwrap_or(false);
        if !valid {
            debug!(account = %principal.account.name, scope = scope.as_str(), "nonce rejected");
            return Err(AppError::InvalidNonce);
        }
    }

    Ok(principal)
}

async fn resolve_principal(
    state: &AppState,
    session: &Session,
    token: Option<&TokenPrincipal>,
) -> Result<Principal, AppError> {
    if let Some(TokenPrincipal(name)) = token
        && let Some(account) = state.accounts().find_by_name(name)
    {
        return Ok(Principal {
            account: account.clone(),
            method: AuthMethod::Token,
        });
    }

    let name: Option<String> = session.get(SESSION_ACCOUNT).await.unwrap_or(None);
    let account = name
        .as_deref()
        .and_then(|n| state.accounts().find_by_name(n))
        .ok_or(AppError::Unauthorized)?;

    Ok(Principal {
        account: account.clone(),
        method: AuthMethod::Session,
    })
}
