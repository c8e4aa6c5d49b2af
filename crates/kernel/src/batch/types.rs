//! Batch result types and summaries.

use serde::{Deserialize, Serialize};

use crate::source::RemotePackageInfo;

pub const MSG_ALREADY_INSTALLED: &str = "Plugin already installed";
pub const MSG_ALREADY_ACTIVE: &str = "Plugin already installed and active";
pub const MSG_ACTIVATED: &str = "Plugin activated successfully";
pub const MSG_INSTALLED: &str = "Plugin installed successfully";
pub const MSG_INSTALLED_ACTIVATED: &str = "Plugin installed and activated successfully";
pub const MSG_NOT_FOUND: &str = "Plugin not found";
pub const MSG_DEACTIVATED: &str = "Deactivated. ";
pub const MSG_DELETED: &str = "Deleted successfully.";
pub const MSG_DELETE_FAILED: &str = "Failed to delete package files.";

/// Outcome of one install batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    AlreadyActive,
    AlreadyInstalled,
    Activated,
    ActivationFailed,
    Installed,
    InstalledActivated,
    InstalledActivationFailed,
    Error,
}

impl InstallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStatus::AlreadyActive => "already_active",
            InstallStatus::AlreadyInstalled => "already_installed",
            InstallStatus::Activated => "activated",
            InstallStatus::ActivationFailed => "activation_failed",
            InstallStatus::Installed => "installed",
            InstallStatus::InstalledActivated => "installed_activated",
            InstallStatus::InstalledActivationFailed => "installed_activation_failed",
            InstallStatus::Error => "error",
        }
    }
}

/// Outcome of one deactivate+delete batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    NotFound,
    Deleted,
    DeleteFailed,
    Error,
}

impl DeleteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteStatus::NotFound => "not_found",
            DeleteStatus::Deleted => "deleted",
            DeleteStatus::DeleteFailed => "delete_failed",
            DeleteStatus::Error => "error",
        }
    }
}

/// Extra data attached to a result. Absent fields are omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_info: Option<RemotePackageInfo>,

    /// Package source error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_error: Option<String>,

    /// Installer error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin_errors: Option<Vec<String>>,

    /// File system error text when deletion failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_error: Option<String>,

    /// Class of an unexpected failure caught at item scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl ResultDetails {
    pub fn with_file(file: &str) -> Self {
        Self {
            plugin_file: Some(file.to_string()),
            ..Default::default()
        }
    }
}

/// One result per requested identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult<S> {
    /// The identifier exactly as the caller sent it.
    pub slug: String,
    pub status: S,
    pub message: String,
    pub details: ResultDetails,
}

impl<S> OperationResult<S> {
    pub fn new(slug: &str, status: S, message: impl Into<String>, details: ResultDetails) -> Self {
        Self {
            slug: slug.to_string(),
            status,
            message: message.into(),
            details,
        }
    }
}

/// Per-item error entry in an install response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub slug: String,
    pub message: String,
}

/// Aggregate counts for an install batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSummary {
    pub total: usize,
    pub installed: usize,
    pub activated: usize,
    pub already_installed: usize,
    pub already_active: usize,
    pub errors: usize,
}

/// Install batch results reduced to what the calling UI displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallReport {
    /// Slugs counted in the `installed` bucket.
    pub installed: Vec<String>,
    pub errors: Vec<BatchError>,
    pub summary: InstallSummary,
}

/// Bucket install results.
///
/// `installed` and `installed_activated` count as installed (the latter
/// also as activated), `activated`, `already_installed` and
/// `already_active` have their own bucket, and every other status is an
/// error.
pub fn summarize_install(results: &[OperationResult<InstallStatus>]) -> InstallReport {
    let mut report = InstallReport {
        summary: InstallSummary {
            total: results.len(),
            ..Default::default()
        },
        ..Default::default()
    };

    for result in results {
        let summary = &mut report.summary;
        match result.status {
            InstallStatus::Installed | InstallStatus::InstalledActivated => {
                report.installed.push(result.slug.clone());
                summary.installed += 1;
                if result.status == InstallStatus::InstalledActivated {
                    summary.activated += 1;
                }
            }
            InstallStatus::Activated => summary.activated += 1,
            InstallStatus::AlreadyInstalled => summary.already_installed += 1,
            InstallStatus::AlreadyActive => summary.already_active += 1,
            InstallStatus::ActivationFailed
            | InstallStatus::InstalledActivationFailed
            | InstallStatus::Error => {
                report.errors.push(BatchError {
                    slug: result.slug.clone(),
                    message: result.message.clone(),
                });
                summary.errors += 1;
            }
        }
    }

    report
}

/// Aggregate counts for a deactivate+delete batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub total: usize,
    pub deactivated: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Results and summary of a deactivate+delete batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteReport {
    pub results: Vec<OperationResult<DeleteStatus>>,
    pub summary: DeleteSummary,
}

/// Options for one install batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Install without raising the maintenance marker.
    pub suppress_maintenance: bool,
}
