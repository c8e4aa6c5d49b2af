//! Zip archive installer.
//!
//! Downloads a package archive, validates its entry names, extracts it into
//! a hidden staging directory inside the packages root and moves the single
//! top-level entry into place. The staging directory shares the packages
//! root's filesystem so the final move is a rename.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;
use zip::ZipArchive;

use super::{
    InstallContext, InstallError, InstallOutcome, Installer, MAINTENANCE_FILE, MaintenanceGuard,
};
use crate::registry::PackageHeader;

/// Largest archive accepted from a download link.
pub const MAX_DOWNLOAD_BYTES: u64 = 64 * 1024 * 1024;

const STAGING_PREFIX: &str = ".plugport-upgrade-";
const DOWNLOAD_PREFIX: &str = ".plugport-download-";

/// Installer for zip archives fetched over HTTP(S).
///
/// `file://` links are refused unless [`ArchiveInstaller::with_local_archives`]
/// was called.
pub struct ArchiveInstaller {
    client: reqwest::Client,
    packages_dir: PathBuf,
    maintenance_file: PathBuf,
    local_archives: bool,
}

impl ArchiveInstaller {
    pub fn new(packages_dir: &Path, state_dir: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("plugport/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            packages_dir: packages_dir.to_path_buf(),
            maintenance_file: state_dir.join(MAINTENANCE_FILE),
            local_archives: false,
        })
    }

    /// Also accept `file://` links, still subject to [`MAX_DOWNLOAD_BYTES`].
    pub fn with_local_archives(mut self) -> Self {
        self.local_archives = true;
        self
    }

    /// Path of the maintenance marker this installer raises.
    pub fn maintenance_file(&self) -> &Path {
        &self.maintenance_file
    }

    async fn download(&self, link: &str, dest: &Path) -> Result<(), InstallError> {
        let url = Url::parse(link).map_err(|e| InstallError::DownloadFailed(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            "file" if self.local_archives => return copy_local_archive(&url, dest).await,
            scheme => {
                return Err(InstallError::DownloadFailed(format!(
                    "unsupported download scheme: {scheme}"
                )));
            }
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InstallError::DownloadFailed(e.to_string()))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| InstallError::DownloadFailed(e.to_string()))?;

        let mut total: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| InstallError::DownloadFailed(e.to_string()))?
        {
            total += chunk.len() as u64;
            if total > MAX_DOWNLOAD_BYTES {
                return Err(InstallError::DownloadFailed(format!(
                    "archive exceeds {MAX_DOWNLOAD_BYTES} bytes"
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| InstallError::DownloadFailed(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| InstallError::DownloadFailed(e.to_string()))?;

        debug!(bytes = total, "package archive downloaded");
        Ok(())
    }
}

async fn copy_local_archive(url: &Url, dest: &Path) -> Result<(), InstallError> {
    let source = url
        .to_file_path()
        .map_err(|_| InstallError::DownloadFailed(format!("invalid file URL: {url}")))?;

    let size = tokio::fs::metadata(&source)
        .await
        .map_err(|e| InstallError::DownloadFailed(e.to_string()))?
        .len();
    if size > MAX_DOWNLOAD_BYTES {
        return Err(InstallError::DownloadFailed(format!(
            "archive exceeds {MAX_DOWNLOAD_BYTES} bytes"
        )));
    }

    tokio::fs::copy(&source, dest)
        .await
        .map_err(|e| InstallError::DownloadFailed(e.to_string()))?;
    Ok(())
}

#[async_trait]
impl Installer for ArchiveInstaller {
    #[instrument(skip(self, context), fields(suppress_maintenance = context.suppress_maintenance))]
    async fn install(
        &self,
        download_link: &str,
        context: &InstallContext,
    ) -> Result<InstallOutcome, InstallError> {
        if download_link.trim().is_empty() {
            return Err(InstallError::NoPackage);
        }

        let _maintenance = if context.suppress_maintenance {
            None
        } else {
            Some(
                MaintenanceGuard::enable(&self.maintenance_file)
                    .map_err(|e| InstallError::CopyFailed(e.to_string()))?,
            )
        };

        let archive = tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .suffix(".zip")
            .tempfile_in(&self.packages_dir)
            .map_err(|e| InstallError::CopyFailed(e.to_string()))?;

        self.download(download_link, archive.path()).await?;

        let packages_dir = self.packages_dir.clone();
        let archive_path = archive.path().to_path_buf();
        let outcome =
            tokio::task::spawn_blocking(move || extract_package(&archive_path, &packages_dir))
                .await
                .map_err(|e| InstallError::CopyFailed(e.to_string()))??;

        info!(destination = %outcome.destination, "package installed");
        Ok(outcome)
    }
}

/// Extract a package archive into `packages_dir`.
pub(crate) fn extract_package(
    archive_path: &Path,
    packages_dir: &Path,
) -> Result<InstallOutcome, InstallError> {
    let file = File::open(archive_path).map_err(|e| InstallError::CopyFailed(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| InstallError::IncompatibleArchive {
        reason: format!("Not a valid zip archive: {e}"),
        entries: Vec::new(),
    })?;

    let mut unsafe_entries = Vec::new();
    let mut top_level = BTreeSet::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| InstallError::IncompatibleArchive {
                reason: format!("Unreadable archive entry: {e}"),
                entries: Vec::new(),
            })?;

        match entry.enclosed_name() {
            Some(path) => {
                if let Some(first) = path.components().next() {
                    top_level.insert(first.as_os_str().to_string_lossy().into_owned());
                }
            }
            None => unsafe_entries.push(entry.name().to_string()),
        }
    }

    if !unsafe_entries.is_empty() {
        warn!(entries = ?unsafe_entries, "archive contains unsafe paths");
        return Err(InstallError::IncompatibleArchive {
            reason: "Unsafe paths in archive.".to_string(),
            entries: unsafe_entries,
        });
    }

    let mut names = top_level.into_iter();
    let (Some(name), None) = (names.next(), names.next()) else {
        return Err(if archive.is_empty() {
            InstallError::NoFiles
        } else {
            InstallError::IncompatibleArchive {
                reason: "The archive must contain exactly one package folder or file.".to_string(),
                entries: archive.file_names().map(str::to_string).collect(),
            }
        });
    };

    let destination = packages_dir.join(&name);
    if destination.exists() {
        return Err(InstallError::FolderExists(name));
    }

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(packages_dir)
        .map_err(|e| InstallError::CopyFailed(e.to_string()))?;

    archive
        .extract(staging.path())
        .map_err(|e| InstallError::CopyFailed(e.to_string()))?;

    let extracted = staging.path().join(&name);
    if !contains_package_header(&extracted) {
        return Err(InstallError::IncompatibleArchive {
            reason: "No valid plugins were found.".to_string(),
            entries: Vec::new(),
        });
    }

    std::fs::rename(&extracted, &destination)
        .map_err(|e| InstallError::CopyFailed(e.to_string()))?;

    Ok(InstallOutcome { destination: name })
}

/// Whether `path` is, or directly contains, a main file with a package header.
fn contains_package_header(path: &Path) -> bool {
    let has_header = |p: &Path| {
        p.is_file()
            && p.extension().is_some_and(|ext| ext == "php")
            && matches!(PackageHeader::read(p), Ok(Some(_)))
    };

    if path.is_dir() {
        std::fs::read_dir(path)
            .map(|entries| entries.filter_map(|e| e.ok()).any(|e| has_header(&e.path())))
            .unwrap_or(false)
    } else {
        has_header(path)
    }
}
