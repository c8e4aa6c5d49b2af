//! Package source.
//!
//! A package source answers one question: given a slug, what is the package
//! called and where can it be downloaded from. Results are used for the
//! current batch item only and never stored.

mod http;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use http::HttpPackageSource;

/// Metadata reported by the package source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemotePackageInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub requires: String,
    pub tested: String,
    pub downloaded: u64,
    pub rating: f64,
    pub num_ratings: u64,

    /// Download reference handed to the installer; not reported to callers.
    #[serde(skip)]
    pub download_link: String,
}

/// Errors raised by a package source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source could not be reached or returned a transport failure.
    #[error("{0}")]
    Unavailable(String),

    /// The source does not know the slug.
    #[error("{0}")]
    NotFound(String),

    /// The source answered with something that is not package metadata.
    #[error("{0}")]
    InvalidResponse(String),
}

impl SourceError {
    /// Stable error code reported in `details.api_error`.
    pub fn code(&self) -> &'static str {
        match self {
            SourceError::Unavailable(_) => "plugins_api_failed",
            SourceError::NotFound(_) => "plugin_not_found",
            SourceError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// External package metadata source.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Look up metadata for a slug.
    async fn fetch_info(&self, slug: &str) -> Result<RemotePackageInfo, SourceError>;
}
