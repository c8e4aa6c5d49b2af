//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default package metadata endpoint.
pub const DEFAULT_SOURCE_API_URL: &str = "https://api.wordpress.org/plugins/info/1.2/";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Root of the plugin tree (default: ./packages).
    pub packages_dir: PathBuf,

    /// Directory for service state such as the active package list (default: ./data).
    pub state_dir: PathBuf,

    /// TOML file listing accounts (default: ./accounts.toml).
    pub accounts_file: PathBuf,

    /// Package metadata endpoint.
    pub source_api_url: String,

    /// Redis connection URL. When None, sessions are kept in memory.
    pub redis_url: Option<String>,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Send the session cookie only over HTTPS (default: true).
    pub cookie_secure: bool,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Whole-request timeout (default: 300s).
    pub request_timeout: Duration,

    /// Largest accepted batch (default: 100).
    pub max_batch_size: usize,

    /// Install batches without the maintenance marker (default: true).
    pub suppress_maintenance: bool,

    /// Timeout for outbound HTTP calls (default: 60s).
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let packages_dir = env::var("PACKAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./packages"));

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let accounts_file = env::var("ACCOUNTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./accounts.toml"));

        let source_api_url =
            env::var("SOURCE_API_URL").unwrap_or_else(|_| DEFAULT_SOURCE_API_URL.to_string());

        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty());

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let cookie_secure = parse_bool("COOKIE_SECURE", true)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let request_timeout = Duration::from_secs(
            env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a valid u64")?,
        );

        let max_batch_size = env::var("MAX_BATCH_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .context("MAX_BATCH_SIZE must be a valid usize")?;

        let suppress_maintenance = parse_bool("SUPPRESS_MAINTENANCE", true)?;

        let http_timeout = Duration::from_secs(
            env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a valid u64")?,
        );

        Ok(Self {
            port,
            packages_dir,
            state_dir,
            accounts_file,
            source_api_url,
            redis_url,
            cookie_same_site,
            cookie_secure,
            cors_allowed_origins,
            request_timeout,
            max_batch_size,
            suppress_maintenance,
            http_timeout,
        })
    }

    /// Configuration rooted at `dir`, with defaults for everything else.
    pub fn for_dir(dir: &std::path::Path) -> Self {
        Self {
            port: 3000,
            packages_dir: dir.join("packages"),
            state_dir: dir.join("data"),
            accounts_file: dir.join("accounts.toml"),
            source_api_url: DEFAULT_SOURCE_API_URL.to_string(),
            redis_url: None,
            cookie_same_site: "strict".to_string(),
            cookie_secure: false,
            cors_allowed_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(300),
            max_batch_size: 100,
            suppress_maintenance: true,
            http_timeout: Duration::from_secs(60),
        }
    }
}

fn parse_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{key} must be a boolean, got '{other}'"),
        },
    }
}
