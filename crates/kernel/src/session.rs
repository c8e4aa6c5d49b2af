//! Session management.
//!
//! Sessions live in Redis when `REDIS_URL` is set and in process memory
//! otherwise.

use anyhow::{Context, Result};
use axum::Router;
use fred::prelude::*;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, SessionStore};
use tower_sessions_redis_store::RedisStore;
use tracing::info;

/// Default session expiry (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Parse the configured SameSite policy. Unknown values fall back to strict.
pub fn parse_same_site(value: &str) -> SameSite {
    match value {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

fn configure<S: SessionStore + Clone>(
    store: S,
    same_site: SameSite,
    secure: bool,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_secure(secure)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )))
}

/// Create a session layer backed by Redis.
pub async fn create_redis_session_layer(
    redis_url: &str,
    same_site: SameSite,
    secure: bool,
) -> Result<SessionManagerLayer<RedisStore<Pool>>> {
    let config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

    let pool = Builder::from_config(config)
        .build_pool(1)
        .context("failed to create Redis pool")?;

    pool.init()
        .await
        .context("failed to connect to Redis for sessions")?;

    Ok(configure(RedisStore::new(pool), same_site, secure))
}

/// Create a session layer backed by process memory.
pub fn create_memory_session_layer(
    same_site: SameSite,
    secure: bool,
) -> SessionManagerLayer<MemoryStore> {
    configure(MemoryStore::default(), same_site, secure)
}

/// Wrap `router` in the configured session layer.
pub async fn with_sessions(
    router: Router,
    redis_url: Option<&str>,
    same_site: SameSite,
    secure: bool,
) -> Result<Router> {
    match redis_url {
        Some(url) => {
            let layer = create_redis_session_layer(url, same_site, secure).await?;
            info!("sessions stored in Redis");
            Ok(router.layer(layer))
        }
        None => {
            info!("sessions stored in memory");
            Ok(router.layer(create_memory_session_layer(same_site, secure)))
        }
    }
}
