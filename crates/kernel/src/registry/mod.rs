//! Package registry.
//!
//! The registry is the host's enumeration of installed packages and their
//! activation state. It owns on-disk package state; everything else reads a
//! snapshot and mutates through [`PackageRegistry`].

mod header;
mod local;
pub mod lookup;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use header::{HEADER_SCAN_BYTES, PackageHeader};
pub use local::LocalRegistry;
pub use lookup::{normalize_identifier, resolve, resolve_by_slug, slug_for_file};

/// One package present on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    /// Main file path relative to the registry root (`akismet/akismet.php`).
    pub file: String,

    /// Metadata declared in the main file.
    pub header: PackageHeader,

    /// Whether the package is currently active.
    pub active: bool,
}

impl InstalledPackage {
    /// Slug derived from the main file path.
    pub fn slug(&self) -> &str {
        slug_for_file(&self.file)
    }
}

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The main file is not part of the current registry.
    #[error("package '{file}' is not installed")]
    NotInstalled { file: String },

    /// Activation blocked by an inactive or missing required package.
    #[error("package '{file}' requires '{dependency}', which is not active")]
    MissingDependency { file: String, dependency: String },

    /// Reading the package tree failed.
    #[error("failed to read package registry: {0}")]
    Scan(String),

    /// Persisting the active package list failed.
    #[error("failed to save active package state: {0}")]
    State(String),
}

/// The host package registry.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Current list of installed packages, in registry order.
    async fn snapshot(&self) -> Result<Vec<InstalledPackage>, RegistryError>;

    /// Activate the package whose main file is `file`.
    async fn activate(&self, file: &str) -> Result<(), RegistryError>;

    /// Deactivate the package whose main file is `file`.
    async fn deactivate(&self, file: &str) -> Result<(), RegistryError>;

    /// Drop any cached package list so the next snapshot rescans.
    fn invalidate_cache(&self);

    /// Path that must be removed to delete the package owning `file`.
    fn removal_target(&self, file: &str) -> PathBuf;
}
