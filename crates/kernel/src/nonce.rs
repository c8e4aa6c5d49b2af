//! Session-scoped anti-forgery nonces.
//!
//! Browser clients authenticated by session cookie must echo a nonce on
//! state-changing requests. A nonce belongs to one session and one scope,
//! stays valid for [`NONCE_VALIDITY_SECS`] and may be reused within that
//! window, so a client can hold on to the nonce it was handed.

use anyhow::{Result, bail};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tower_sessions::Session;

/// Request header carrying the REST nonce.
pub const NONCE_HEADER: &str = "X-WP-Nonce";

/// Session key for stored nonces.
const NONCE_SESSION_KEY: &str = "nonces";

/// Maximum number of nonces kept per session.
const MAX_NONCES: usize = 10;

/// Nonce validity period in seconds (12 hours).
pub const NONCE_VALIDITY_SECS: i64 = 12 * 3600;

/// A nonce younger than this is handed out again instead of minting a new one.
const NONCE_REISSUE_SECS: i64 = NONCE_VALIDITY_SECS / 2;

/// What a nonce authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceScope {
    /// JSON routes, sent in [`NONCE_HEADER`].
    Rest,
    /// Legacy form transport, sent as the `nonce` field.
    Ajax,
}

impl NonceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            NonceScope::Rest => "wp_rest",
            NonceScope::Ajax => "plugport_ajax",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNonce {
    scope: String,
    token: String,
    issued: i64,
}

async fn load(session: &Session) -> Vec<StoredNonce> {
    session
        .get(NONCE_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default()
}

/// Return a valid nonce for `scope`, minting one if needed.
pub async fn issue_nonce(session: &Session, scope: NonceScope) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let mut nonces = load(session).await;
    nonces.retain(|n| now - n.issued <= NONCE_VALIDITY_SECS);

    if let Some(fresh) = nonces
        .iter()
        .rev()
        .find(|n| n.scope == scope.as_str() && now - n.issued < NONCE_REISSUE_SECS)
    {
        return Ok(fresh.token.clone());
    }

    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(scope.as_str().as_bytes());
    hasher.update(now.to_le_bytes());
    let token = hex::encode(hasher.finalize())[..20].to_string();

    nonces.push(StoredNonce {
        scope: scope.as_str().to_string(),
        token: token.clone(),
        issued: now,
    });
    if nonces.len() > MAX_NONCES {
        let skip = nonces.len() - MAX_NONCES;
        nonces.drain(..skip);
    }

    session
        .insert(NONCE_SESSION_KEY, nonces)
        .await
        .map_err(|e| anyhow::anyhow!("failed to store nonce: {e}"))?;

    Ok(token)
}

/// Verify a submitted nonce for `scope` against the session.
pub async fn verify_nonce(session: &Session, scope: NonceScope, submitted: &str) -> Result<bool> {
    if submitted.is_empty() {
        bail!("empty nonce");
    }

    let now = chrono::Utc::now().timestamp();
    let valid = load(session).await.iter().any(|n| {
        n.scope == scope.as_str()
            && now - n.issued <= NONCE_VALIDITY_SECS
            && bool::from(n.token.as_bytes().ct_eq(submitted.as_bytes()))
    });

    Ok(valid)
}

/// Forget all nonces of the session.
pub async fn clear_nonces(session: &Session) -> Result<()> {
    session
        .remove::<Vec<StoredNonce>>(NONCE_SESSION_KEY)
        .await
        .map_err(|e| anyhow::anyhow!("failed to clear nonces: {e}"))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn issued_nonce_verifies_repeatedly() {
        let session = session();
        let nonce = issue_nonce(&session, NonceScope::Rest).await.unwrap();
        assert_eq!(nonce.len(), 20);

        assert!(verify_nonce(&session, NonceScope::Rest, &nonce).await.unwrap());
        assert!(verify_nonce(&session, NonceScope::Rest, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn nonce_is_reissued_while_fresh() {
        let session = session();
        let a = issue_nonce(&session, NonceScope::Rest).await.unwrap();
        let b = issue_nonce(&session, NonceScope::Rest).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn scopes_do_not_mix() {
        let session = session();
        let rest = issue_nonce(&session, NonceScope::Rest).await.unwrap();
        let ajax = issue_nonce(&session, NonceScope::Ajax).await.unwrap();
        assert_ne!(rest, ajax);

        assert!(!verify_nonce(&session, NonceScope::Ajax, &rest).await.unwrap());
        assert!(verify_nonce(&session, NonceScope::Ajax, &ajax).await.unwrap());
    }

    #[tokio::test]
    async fn other_session_rejects_nonce() {
        let nonce = issue_nonce(&session(), NonceScope::Rest).await.unwrap();
        assert!(!verify_nonce(&session(), NonceScope::Rest, &nonce).await.unwrap());
    }

    #[tokio::test]
    async fn expired_and_empty_nonces_rejected() {
        let session = session();
        let stale = vec![StoredNonce {
            scope: NonceScope::Rest.as_str().to_string(),
            token: "stale".to_string(),
            issued: chrono::Utc::now().timestamp() - NONCE_VALIDITY_SECS - 1,
        }];
        session.insert(NONCE_SESSION_KEY, stale).await.unwrap();

        assert!(!verify_nonce(&session, NonceScope::Rest, "stale").await.unwrap());
        assert!(verify_nonce(&session, NonceScope::Rest, "").await.is_err());
    }

    #[tokio::test]
    async fn clearing_invalidates() {
        let session = session();
        let nonce = issue_nonce(&session, NonceScope::Rest).await.unwrap();
        clear_nonces(&session).await.unwrap();
        assert!(!verify_nonce(&session, NonceScope::Rest, &nonce).await.unwrap());
    }
}
