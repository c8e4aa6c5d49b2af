//! Package installer.
//!
//! Installs a package from a download reference into the plugin tree. While
//! an install is running the installer normally raises a maintenance marker;
//! batch callers may suppress it through [`InstallContext`].

mod archive;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub use archive::ArchiveInstaller;

/// Name of the maintenance marker file inside the state directory.
pub const MAINTENANCE_FILE: &str = ".maintenance";

/// Per-batch install settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallContext {
    /// Skip the maintenance marker for installs made under this context.
    pub suppress_maintenance: bool,
}

/// What an install put on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Top-level entry created under the packages root (directory or file).
    pub destination: String,
}

/// Installer failures.
#[derive(Debug, Clone, Error)]
pub enum InstallError {
    #[error("Installation package not available.")]
    NoPackage,

    #[error("Download failed. {0}")]
    DownloadFailed(String),

    #[error("The package could not be installed. {reason}")]
    IncompatibleArchive {
        reason: String,
        /// Archive entries that caused the rejection.
        entries: Vec<String>,
    },

    #[error("Destination folder already exists: {0}")]
    FolderExists(String),

    #[error("The package contains no files.")]
    NoFiles,

    #[error("Could not copy files. {0}")]
    CopyFailed(String),
}

impl InstallError {
    /// Stable error code reported in `details.install_error`.
    pub fn code(&self) -> &'static str {
        match self {
            InstallError::NoPackage => "no_package",
            InstallError::DownloadFailed(_) => "download_failed",
            InstallError::IncompatibleArchive { .. } => "incompatible_archive",
            InstallError::FolderExists(_) => "folder_exists",
            InstallError::NoFiles => "no_files",
            InstallError::CopyFailed(_) => "copy_failed",
        }
    }

    /// Detail lines collected while installing, reported as `skin_errors`.
    pub fn messages(&self) -> Vec<String> {
        match self {
            InstallError::IncompatibleArchive { entries, .. } => entries
                .iter()
                .map(|e| format!("Rejected archive entry: {e}"))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Installs packages from download references.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(
        &self,
        download_link: &str,
        context: &InstallContext,
    ) -> Result<InstallOutcome, InstallError>;
}

/// Maintenance marker that lives exactly as long as the guard.
#[derive(Debug)]
pub struct MaintenanceGuard {
    path: PathBuf,
}

impl MaintenanceGuard {
    /// Write the marker at `path`.
    pub fn enable(path: &Path) -> std::io::Result<Self> {
        let marker = serde_json::json!({ "upgrading": chrono::Utc::now().timestamp() });
        std::fs::write(path, marker.to_string())?;
        debug!(path = %path.display(), "maintenance marker raised");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Whether a marker is present at `path`.
    pub fn is_active(path: &Path) -> bool {
        path.exists()
    }
}

impl Drop for MaintenanceGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "maintenance marker cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to clear maintenance marker"),
        }
    }
}
