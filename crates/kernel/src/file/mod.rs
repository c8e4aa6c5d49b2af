//! File system collaborator.
//!
//! Package deletion goes through [`FileSystem::remove_tree`]; nothing else in
//! the kernel removes files from the packages root.

mod tree;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use tree::{DEFAULT_MAX_DEPTH, LocalFileSystem};

/// File system errors.
#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("refusing to remove path outside the packages root: {0}")]
    OutsideRoot(PathBuf),

    #[error("directory tree deeper than {max_depth} levels at {path}")]
    TooDeep { path: PathBuf, max_depth: usize },

    #[error("directory visited twice while walking {0}")]
    Loop(PathBuf),

    #[error("i/o error at {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl FileSystemError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        FileSystemError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// File system operations used by package deletion.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Recursively remove a file or directory tree.
    async fn remove_tree(&self, path: &Path) -> Result<(), FileSystemError>;
}
