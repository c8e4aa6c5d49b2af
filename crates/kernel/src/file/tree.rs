//! Bounded tree removal on the local disk.
//!
//! The walk never follows symbolic links: a link is removed as a link. Every
//! directory is recorded by canonical path so a bind mount or similar cycle
//! is reported instead of walked forever. The whole tree is planned before
//! the first removal, so a depth or loop violation leaves the disk untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::{FileSystem, FileSystemError};

/// Maximum directory nesting accepted below the removal target.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// File system confined to one root directory.
pub struct LocalFileSystem {
    root: PathBuf,
    max_depth: usize,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn remove_tree(&self, path: &Path) -> Result<(), FileSystemError> {
        let root = self.root.clone();
        let target = path.to_path_buf();
        let max_depth = self.max_depth;

        tokio::task::spawn_blocking(move || remove_tree_blocking(&root, &target, max_depth))
            .await
            .map_err(|e| FileSystemError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
    }
}

enum Removal {
    File(PathBuf),
    Dir(PathBuf),
}

fn remove_tree_blocking(root: &Path, target: &Path, max_depth: usize) -> Result<(), FileSystemError> {
    let metadata = match std::fs::symlink_metadata(target) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileSystemError::NotFound(target.to_path_buf()));
        }
        Err(e) => return Err(FileSystemError::io(target, e)),
    };

    ensure_within_root(root, target)?;

    if !metadata.is_dir() {
        std::fs::remove_file(target).map_err(|e| FileSystemError::io(target, e))?;
        info!(path = %target.display(), "file removed");
        return Ok(());
    }

    let mut plan = Vec::new();
    let mut visited = HashSet::new();
    plan_dir(target, 0, max_depth, &mut visited, &mut plan)?;

    let count = plan.len();
    for step in plan {
        match step {
            Removal::File(p) => std::fs::remove_file(&p).map_err(|e| FileSystemError::io(&p, e))?,
            Removal::Dir(p) => std::fs::remove_dir(&p).map_err(|e| FileSystemError::io(&p, e))?,
        }
    }

    info!(path = %target.display(), entries = count, "directory tree removed");
    Ok(())
}

/// Post-order removal plan for `dir`.
fn plan_dir(
    dir: &Path,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<PathBuf>,
    plan: &mut Vec<Removal>,
) -> Result<(), FileSystemError> {
    if depth > max_depth {
        return Err(FileSystemError::TooDeep {
            path: dir.to_path_buf(),
            max_depth,
        });
    }

    let canonical = dir.canonicalize().map_err(|e| FileSystemError::io(dir, e))?;
    if !visited.insert(canonical) {
        return Err(FileSystemError::Loop(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| FileSystemError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| FileSystemError::io(dir, e))?;
        let path = entry.path();
        // file_type() does not follow symlinks.
        let file_type = entry.file_type().map_err(|e| FileSystemError::io(&path, e))?;

        if file_type.is_dir() {
            plan_dir(&path, depth + 1, max_depth, visited, plan)?;
        } else {
            plan.push(Removal::File(path));
        }
    }

    debug!(dir = %dir.display(), depth, "directory planned for removal");
    plan.push(Removal::Dir(dir.to_path_buf()));
    Ok(())
}

/// The target must be a strict descendant of the root.
///
/// Only the target's parent is canonicalized; the target itself may be a
/// symlink and must not be resolved.
fn ensure_within_root(root: &Path, target: &Path) -> Result<(), FileSystemError> {
    let outside = || FileSystemError::OutsideRoot(target.to_path_buf());

    let root = root.canonicalize().map_err(|e| FileSystemError::io(root, e))?;
    let parent = target.parent().ok_or_else(outside)?;
    let parent = parent
        .canonicalize()
        .map_err(|e| FileSystemError::io(parent, e))?;

    let name = target.file_name().ok_or_else(outside)?;
    if name == ".." || !parent.join(name).starts_with(&root) || parent.join(name) == root {
        return Err(outside());
    }
    Ok(())
}
