//! Disk-backed package registry.
//!
//! Packages live under a single root directory, either as a single main
//! file (`hello.php`) or as a directory holding one main file at its top
//! level (`akismet/akismet.php`). Deeper files are never scanned. The set of
//! active packages is persisted as a JSON array of main-file paths.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::lookup::{MAIN_FILE_EXT, resolve_by_slug};
use super::{InstalledPackage, PackageHeader, PackageRegistry, RegistryError};

/// File name of the persisted active package list inside the state directory.
pub const ACTIVE_STATE_FILE: &str = "active-packages.json";

type ScannedPackages = Arc<Vec<(String, PackageHeader)>>;

/// Registry over a plugin tree on the local disk.
pub struct LocalRegistry {
    root: PathBuf,
    state_file: PathBuf,

    /// Cached result of the last tree scan.
    cache: parking_lot::RwLock<Option<ScannedPackages>>,

    /// Bumped on every invalidation; a scan started under an older
    /// generation is not cached.
    generation: AtomicU64,

    /// Active main files, in activation order.
    active: tokio::sync::Mutex<Vec<String>>,
}

impl LocalRegistry {
    /// Open a registry rooted at `root`, keeping state in `state_dir`.
    ///
    /// Both directories are created if missing.
    pub fn open(root: impl Into<PathBuf>, state_dir: &Path) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create packages directory: {}", root.display()))?;
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create state directory: {}", state_dir.display()))?;

        let state_file = state_dir.join(ACTIVE_STATE_FILE);
        let active = load_active(&state_file)?;

        info!(root = %root.display(), active = active.len(), "package registry opened");

        Ok(Self {
            root,
            state_file,
            cache: parking_lot::RwLock::new(None),
            generation: AtomicU64::new(0),
            active: tokio::sync::Mutex::new(active),
        })
    }

    /// Registry root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scanned(&self) -> Result<ScannedPackages, RegistryError> {
        let cached = self.cache.read().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let root = self.root.clone();
        let scanned = tokio::task::spawn_blocking(move || scan_tree(&root))
            .await
            .map_err(|e| RegistryError::Scan(e.to_string()))??;

        debug!(count = scanned.len(), "package tree scanned");

        let scanned = Arc::new(scanned);
        self.store_scan(generation, &scanned);
        Ok(scanned)
    }

    /// Cache `scanned` unless the cache was invalidated since `generation`.
    fn store_scan(&self, generation: u64, scanned: &ScannedPackages) {
        let mut cache = self.cache.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *cache = Some(Arc::clone(scanned));
        } else {
            debug!("discarding package scan started before invalidation");
        }
    }

    async fn persist(&self, active: &[String]) -> Result<(), RegistryError> {
        let json =
            serde_json::to_vec_pretty(active).map_err(|e| RegistryError::State(e.to_string()))?;

        let tmp = self.state_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| RegistryError::State(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.state_file)
            .await
            .map_err(|e| RegistryError::State(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl PackageRegistry for LocalRegistry {
    async fn snapshot(&self) -> Result<Vec<InstalledPackage>, RegistryError> {
        let scanned = self.scanned().await?;
        let active = self.active.lock().await;

        Ok(scanned
            .iter()
            .map(|(file, header)| InstalledPackage {
                file: file.clone(),
                header: header.clone(),
                active: active.iter().any(|a| a == file),
            })
            .collect())
    }

    async fn activate(&self, file: &str) -> Result<(), RegistryError> {
        let snapshot = self.snapshot().await?;
        let package = snapshot
            .iter()
            .find(|p| p.file == file)
            .ok_or_else(|| RegistryError::NotInstalled {
                file: file.to_string(),
            })?;

        // Required packages must already be active.
        for dependency in &package.header.requires_plugins {
            let satisfied = resolve_by_slug(dependency, &snapshot).is_some_and(|p| p.active);
            if !satisfied {
                return Err(RegistryError::MissingDependency {
                    file: file.to_string(),
                    dependency: dependency.clone(),
                });
            }
        }

        let mut active = self.active.lock().await;
        if active.iter().any(|a| a == file) {
            return Ok(());
        }

        active.push(file.to_string());
        if let Err(e) = self.persist(&active).await {
            active.retain(|a| a != file);
            return Err(e);
        }

        info!(file = %file, "package activated");
        Ok(())
    }

    async fn deactivate(&self, file: &str) -> Result<(), RegistryError> {
        let mut active = self.active.lock().await;
        let Some(position) = active.iter().position(|a| a == file) else {
            return Ok(());
        };

        let removed = active.remove(position);
        if let Err(e) = self.persist(&active).await {
            active.insert(position, removed);
            return Err(e);
        }

        info!(file = %file, "package deactivated");
        Ok(())
    }

    fn invalidate_cache(&self) {
        let mut cache = self.cache.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *cache = None;
    }

    fn removal_target(&self, file: &str) -> PathBuf {
        match file.split_once('/') {
            Some((dir, _)) => self.root.join(dir),
            None => self.root.join(file),
        }
    }
}

/// Load the persisted active list; a missing file means nothing is active.
fn load_active(state_file: &Path) -> anyhow::Result<Vec<String>> {
    if !state_file.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read(state_file)
        .with_context(|| format!("failed to read {}", state_file.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("failed to parse {}", state_file.display()))
}

/// Scan the package tree, returning `(main_file, header)` pairs sorted by path.
fn scan_tree(root: &Path) -> Result<Vec<(String, PackageHeader)>, RegistryError> {
    let mut found = Vec::new();

    if !root.exists() {
        info!(root = %root.display(), "packages directory does not exist, nothing to scan");
        return Ok(found);
    }

    let entries =
        sorted_entries(root).map_err(|e| RegistryError::Scan(format!("{}: {e}", root.display())))?;

    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        if path.is_dir() {
            for inner in package_dir_entries(&path)? {
                let inner_path = inner.path();
                let Some(inner_name) = inner.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if is_main_file_candidate(&inner_path)
                    && let Some(header) = read_header(&inner_path)
                {
                    found.push((format!("{name}/{inner_name}"), header));
                }
            }
        } else if is_main_file_candidate(&path)
            && let Some(header) = read_header(&path)
        {
            found.push((name, header));
        }
    }

    Ok(found)
}

/// Entries of one package directory. A directory removed after the root was
/// listed has no entries.
fn package_dir_entries(dir: &Path) -> Result<Vec<std::fs::DirEntry>, RegistryError> {
    match sorted_entries(dir) {
        Ok(entries) => Ok(entries),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "package directory vanished during scan");
            Ok(Vec::new())
        }
        Err(e) => Err(RegistryError::Scan(format!("{}: {e}", dir.display()))),
    }
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<std::fs::DirEntry>> {
    let entries = std::fs::read_dir(dir)?;

    let mut entries: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn is_main_file_candidate(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == MAIN_FILE_EXT)
}

fn read_header(path: &Path) -> Option<PackageHeader> {
    match PackageHeader::read(path) {
        Ok(header) => header,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable package file");
            None
        }
    }
}
