//! Item-scoped failures.

use thiserror::Error;
use tokio::task::JoinError;

use super::types::{DeleteStatus, InstallStatus, OperationResult, ResultDetails};
use crate::file::FileSystemError;
use crate::installer::InstallError;
use crate::registry::RegistryError;
use crate::source::SourceError;

/// A failure while processing one batch item.
///
/// Never escapes the batch: every variant is turned into an `error` result
/// for the item it happened on.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("{0}")]
    Source(SourceError),

    #[error("{0}")]
    Install(InstallError),

    #[error("{0}")]
    Activation(RegistryError),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    FileSystem(#[from] FileSystemError),

    #[error("Invalid plugin slug: '{0}'")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Panic(String),
}

impl OperationError {
    /// Error class reported in `details.exception`.
    pub fn class_name(&self) -> &'static str {
        match self {
            OperationError::Source(_) => "SourceError",
            OperationError::Install(_) => "InstallError",
            OperationError::Activation(_) => "ActivationError",
            OperationError::Registry(_) => "RegistryError",
            OperationError::FileSystem(_) => "FileSystemError",
            OperationError::InvalidIdentifier(_) => "ValidationError",
            OperationError::Panic(_) => "Panic",
        }
    }

    /// Convert a failed item task into an error.
    pub fn from_join(err: JoinError) -> Self {
        if !err.is_panic() {
            return OperationError::Panic(err.to_string());
        }

        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "item processing panicked".to_string());
        OperationError::Panic(message)
    }

    fn details(&self) -> ResultDetails {
        match self {
            OperationError::Source(e) => ResultDetails {
                api_error: Some(e.code().to_string()),
                ..Default::default()
            },
            OperationError::Install(e) => {
                let messages = e.messages();
                ResultDetails {
                    install_error: Some(e.code().to_string()),
                    skin_errors: (!messages.is_empty()).then_some(messages),
                    ..Default::default()
                }
            }
            other => ResultDetails {
                exception: Some(other.class_name().to_string()),
                ..Default::default()
            },
        }
    }

    pub fn into_install_result(self, slug: &str) -> OperationResult<InstallStatus> {
        let details = self.details();
        OperationResult::new(slug, InstallStatus::Error, self.to_string(), details)
    }

    pub fn into_delete_result(self, slug: &str) -> OperationResult<DeleteStatus> {
        let details = ResultDetails {
            exception: Some(self.class_name().to_string()),
            ..Default::default()
        };
        OperationResult::new(slug, DeleteStatus::Error, format!("Error: {self}"), details)
    }
}
