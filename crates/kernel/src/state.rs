//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::batch::BulkOrchestrator;
use crate::config::Config;
use crate::file::{FileSystem, LocalFileSystem};
use crate::installer::{ArchiveInstaller, Installer};
use crate::metrics::Metrics;
use crate::models::AccountStore;
use crate::registry::{LocalRegistry, PackageRegistry};
use crate::source::{HttpPackageSource, PackageSource};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Runs install and delete batches against the collaborators.
    orchestrator: BulkOrchestrator,

    /// Accounts allowed to sign in or present API tokens.
    accounts: AccountStore,

    metrics: Arc<Metrics>,
}

impl AppState {
    /// Assemble state from explicit collaborators.
    pub fn new(
        config: Config,
        accounts: AccountStore,
        registry: Arc<dyn PackageRegistry>,
        source: Arc<dyn PackageSource>,
        installer: Arc<dyn Installer>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let orchestrator =
            BulkOrchestrator::new(registry, source, installer, fs).with_metrics(metrics.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                orchestrator,
                accounts,
                metrics,
            }),
        }
    }

    /// Wire the on-disk registry, the HTTP package source and the archive
    /// installer from configuration.
    pub fn from_config(config: Config, accounts: AccountStore) -> Result<Self> {
        let registry = LocalRegistry::open(&config.packages_dir, &config.state_dir)
            .context("failed to open package registry")?;
        let source = HttpPackageSource::new(&config.source_api_url, config.http_timeout)
            .context("failed to create package source")?;
        let installer =
            ArchiveInstaller::new(&config.packages_dir, &config.state_dir, config.http_timeout)
                .context("failed to create installer")?;
        let fs = LocalFileSystem::new(&config.packages_dir);

        info!(
            packages_dir = %config.packages_dir.display(),
            accounts = accounts.len(),
            "application state initialized"
        );

        Ok(Self::new(
            config,
            accounts,
            Arc::new(registry),
            Arc::new(source),
            Arc::new(installer),
            Arc::new(fs),
        ))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn orchestrator(&self) -> &BulkOrchestrator {
        &self.inner.orchestrator
    }

    pub fn registry(&self) -> &Arc<dyn PackageRegistry> {
        self.inner.orchestrator.registry()
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.inner.accounts
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }
}
