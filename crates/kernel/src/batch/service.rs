//! Bulk package orchestrator.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::OperationError;
use super::lock::IdentifierLocks;
use super::types::*;
use crate::file::FileSystem;
use crate::installer::{InstallContext, Installer};
use crate::metrics::Metrics;
use crate::registry::{PackageRegistry, normalize_identifier, resolve, resolve_by_slug};
use crate::source::PackageSource;

/// Runs install and deactivate+delete batches.
///
/// Items are processed strictly one after another. Each item runs in its own
/// task so that a panicking collaborator fails that item only.
#[derive(Clone)]
pub struct BulkOrchestrator {
    registry: Arc<dyn PackageRegistry>,
    source: Arc<dyn PackageSource>,
    installer: Arc<dyn Installer>,
    fs: Arc<dyn FileSystem>,
    locks: IdentifierLocks,
    metrics: Option<Arc<Metrics>>,
}

impl BulkOrchestrator {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        source: Arc<dyn PackageSource>,
        installer: Arc<dyn Installer>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            registry,
            source,
            installer,
            fs,
            locks: IdentifierLocks::new(),
            metrics: None,
        }
    }

    /// Count processed items in `batch_items_total`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The registry this orchestrator mutates.
    pub fn registry(&self) -> &Arc<dyn PackageRegistry> {
        &self.registry
    }

    /// Install (and optionally activate) each identifier in order.
    ///
    /// Always yields exactly one result per identifier, in input order.
    pub async fn install_batch(
        &self,
        identifiers: &[String],
        activate: bool,
        options: BatchOptions,
    ) -> Vec<OperationResult<InstallStatus>> {
        let batch_id = Uuid::now_v7();
        let context = InstallContext {
            suppress_maintenance: options.suppress_maintenance,
        };

        info!(
            batch_id = %batch_id,
            count = identifiers.len(),
            activate,
            suppress_maintenance = options.suppress_maintenance,
            "install batch started"
        );

        let mut results = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let this = self.clone();
            let raw = identifier.clone();
            let task =
                tokio::spawn(async move { this.install_item(&raw, activate, &context).await });

            let result = match task.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!(slug = %identifier, error = %e, class = e.class_name(), "install item failed");
                    e.into_install_result(identifier)
                }
                Err(join) => {
                    let e = OperationError::from_join(join);
                    warn!(slug = %identifier, error = %e, "install item panicked");
                    e.into_install_result(identifier)
                }
            };

            debug!(batch_id = %batch_id, slug = %identifier, status = result.status.as_str(), "install item done");
            self.record("install", result.status.as_str());
            results.push(result);
        }

        info!(batch_id = %batch_id, count = results.len(), "install batch finished");
        results
    }

    async fn install_item(
        &self,
        raw: &str,
        activate: bool,
        context: &InstallContext,
    ) -> Result<OperationResult<InstallStatus>, OperationError> {
        let slug = normalize_identifier(raw);
        if slug.is_empty() {
            return Err(OperationError::InvalidIdentifier(raw.to_string()));
        }

        let _lock = self.locks.acquire(&slug).await;
        let snapshot = self.registry.snapshot().await?;

        if let Some(package) = resolve(&slug, &snapshot) {
            let details = ResultDetails::with_file(&package.file);

            if package.active {
                return Ok(OperationResult::new(
                    raw,
                    InstallStatus::AlreadyActive,
                    MSG_ALREADY_ACTIVE,
                    details,
                ));
            }
            if !activate {
                return Ok(OperationResult::new(
                    raw,
                    InstallStatus::AlreadyInstalled,
                    MSG_ALREADY_INSTALLED,
                    details,
                ));
            }

            return Ok(match self.registry.activate(&package.file).await {
                Ok(()) => OperationResult::new(raw, InstallStatus::Activated, MSG_ACTIVATED, details),
                Err(e) => {
                    let e = OperationError::Activation(e);
                    OperationResult::new(raw, InstallStatus::ActivationFailed, e.to_string(), details)
                }
            });
        }

        let info = self
            .source
            .fetch_info(&slug)
            .await
            .map_err(OperationError::Source)?;

        if let Err(e) = self.installer.install(&info.download_link, context).await {
            let mut result = OperationError::Install(e).into_install_result(raw);
            result.details.plugin_info = Some(info);
            return Ok(result);
        }

        self.registry.invalidate_cache();
        let snapshot = self.registry.snapshot().await?;

        let mut details = ResultDetails {
            plugin_info: Some(info),
            ..Default::default()
        };

        let Some(package) = resolve(&slug, &snapshot) else {
            warn!(slug = %slug, "installed package not found in registry after install");
            return Ok(OperationResult::new(
                raw,
                InstallStatus::Installed,
                MSG_INSTALLED,
                details,
            ));
        };
        details.plugin_file = Some(package.file.clone());

        if !activate {
            return Ok(OperationResult::new(
                raw,
                InstallStatus::Installed,
                MSG_INSTALLED,
                details,
            ));
        }

        Ok(match self.registry.activate(&package.file).await {
            Ok(()) => OperationResult::new(
                raw,
                InstallStatus::InstalledActivated,
                MSG_INSTALLED_ACTIVATED,
                details,
            ),
            Err(e) => OperationResult::new(
                raw,
                InstallStatus::InstalledActivationFailed,
                format!("Plugin installed but activation failed: {e}"),
                details,
            ),
        })
    }

    /// Deactivate (when active) and delete each identifier in order.
    pub async fn deactivate_and_delete(&self, identifiers: &[String]) -> DeleteReport {
        let batch_id = Uuid::now_v7();
        info!(batch_id = %batch_id, count = identifiers.len(), "delete batch started");

        let mut report = DeleteReport {
            results: Vec::with_capacity(identifiers.len()),
            summary: DeleteSummary {
                total: identifiers.len(),
                ..Default::default()
            },
        };

        for identifier in identifiers {
            let this = self.clone();
            let raw = identifier.clone();
            let task = tokio::spawn(async move { this.delete_item(&raw).await });

            let (result, deactivated) = match task.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(slug = %identifier, error = %e, class = e.class_name(), "delete item failed");
                    (e.into_delete_result(identifier), false)
                }
                Err(join) => {
                    let e = OperationError::from_join(join);
                    warn!(slug = %identifier, error = %e, "delete item panicked");
                    (e.into_delete_result(identifier), false)
                }
            };

            let summary = &mut report.summary;
            if deactivated {
                summary.deactivated += 1;
            }
            match result.status {
                DeleteStatus::Deleted => summary.deleted += 1,
                DeleteStatus::NotFound | DeleteStatus::DeleteFailed | DeleteStatus::Error => {
                    summary.errors += 1
                }
            }

            debug!(batch_id = %batch_id, slug = %identifier, status = result.status.as_str(), "delete item done");
            self.record("delete", result.status.as_str());
            report.results.push(result);
        }

        info!(
            batch_id = %batch_id,
            deleted = report.summary.deleted,
            errors = report.summary.errors,
            "delete batch finished"
        );
        report
    }

    /// Returns the result and whether a deactivation happened.
    async fn delete_item(
        &self,
        raw: &str,
    ) -> Result<(OperationResult<DeleteStatus>, bool), OperationError> {
        let slug = normalize_identifier(raw);
        let not_found = || {
            OperationResult::new(
                raw,
                DeleteStatus::NotFound,
                MSG_NOT_FOUND,
                ResultDetails::default(),
            )
        };
        if slug.is_empty() {
            return Ok((not_found(), false));
        }

        let _lock = self.locks.acquire(&slug).await;
        let snapshot = self.registry.snapshot().await?;

        let Some(package) = resolve_by_slug(&slug, &snapshot) else {
            return Ok((not_found(), false));
        };
        let file = package.file.clone();
        let mut details = ResultDetails::with_file(&file);

        let mut message = String::new();
        let deactivated = package.active;
        if deactivated {
            self.registry.deactivate(&file).await?;
            message.push_str(MSG_DEACTIVATED);
        }

        let target = self.registry.removal_target(&file);
        let removed = self.fs.remove_tree(&target).await;
        self.registry.invalidate_cache();

        let result = match removed {
            Ok(()) => {
                message.push_str(MSG_DELETED);
                OperationResult::new(raw, DeleteStatus::Deleted, message, details)
            }
            Err(e) => {
                warn!(slug = %slug, path = %target.display(), error = %e, "package removal failed");
                message.push_str(MSG_DELETE_FAILED);
                details.delete_error = Some(e.to_string());
                OperationResult::new(raw, DeleteStatus::DeleteFailed, message, details)
            }
        };

        Ok((result, deactivated))
    }

    fn record(&self, operation: &str, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_batch_item(operation, status);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::file::FileSystemError;
    use crate::installer::{InstallError, InstallOutcome};
    use crate::registry::{InstalledPackage, PackageHeader, RegistryError};
    use crate::source::{RemotePackageInfo, SourceError};

    fn package(file: &str, text_domain: &str, active: bool) -> InstalledPackage {
        InstalledPackage {
            file: file.to_string(),
            header: PackageHeader {
                name: file.to_string(),
                version: "1.0".to_string(),
                text_domain: text_domain.to_string(),
                ..Default::default()
            },
            active,
        }
    }

    /// Registry whose freshly installed packages stay hidden until the cache
    /// is invalidated.
    #[derive(Default)]
    struct MemoryRegistry {
        packages: Mutex<Vec<InstalledPackage>>,
        pending: Mutex<Vec<InstalledPackage>>,
        broken_activation: Mutex<HashSet<String>>,
        activations: AtomicUsize,
        deactivations: AtomicUsize,
    }

    impl MemoryRegistry {
        fn with(packages: Vec<InstalledPackage>) -> Arc<Self> {
            let registry = Self::default();
            *registry.packages.lock() = packages;
            Arc::new(registry)
        }

        fn break_activation(&self, file: &str) {
            self.broken_activation.lock().insert(file.to_string());
        }

        fn is_active(&self, file: &str) -> bool {
            self.packages.lock().iter().any(|p| p.file == file && p.active)
        }

        fn files(&self) -> Vec<String> {
            self.packages.lock().iter().map(|p| p.file.clone()).collect()
        }
    }

    #[async_trait]
    impl PackageRegistry for MemoryRegistry {
        async fn snapshot(&self) -> Result<Vec<InstalledPackage>, RegistryError> {
            Ok(self.packages.lock().clone())
        }

        async fn activate(&self, file: &str) -> Result<(), RegistryError> {
            self.activations.fetch_add(1, Ordering::SeqCst);
            if self.broken_activation.lock().contains(file) {
                return Err(RegistryError::MissingDependency {
                    file: file.to_string(),
                    dependency: "woocommerce".to_string(),
                });
            }
            let mut packages = self.packages.lock();
            let package = packages
                .iter_mut()
                .find(|p| p.file == file)
                .ok_or_else(|| RegistryError::NotInstalled {
                    file: file.to_string(),
                })?;
            package.active = true;
            Ok(())
        }

        async fn deactivate(&self, file: &str) -> Result<(), RegistryError> {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
            for p in self.packages.lock().iter_mut().filter(|p| p.file == file) {
                p.active = false;
            }
            Ok(())
        }

        fn invalidate_cache(&self) {
            let pending: Vec<_> = self.pending.lock().drain(..).collect();
            self.packages.lock().extend(pending);
        }

        fn removal_target(&self, file: &str) -> PathBuf {
            let root = Path::new("/packages");
            match file.split_once('/') {
                Some((dir, _)) => root.join(dir),
                None => root.join(file),
            }
        }
    }

    /// Source knowing a fixed set of slugs; `boom` panics.
    struct FakeSource {
        known: HashSet<&'static str>,
    }

    #[async_trait]
    impl PackageSource for FakeSource {
        async fn fetch_info(&self, slug: &str) -> Result<RemotePackageInfo, SourceError> {
            if slug == "boom" {
                panic!("source exploded");
            }
            if !self.known.contains(slug) {
                return Err(SourceError::NotFound("Plugin not found.".to_string()));
            }
            Ok(RemotePackageInfo {
                name: format!("Remote {slug}"),
                version: "2.0".to_string(),
                download_link: format!("https://downloads.example.org/{slug}.zip"),
                ..Default::default()
            })
        }
    }

    /// Installer that registers `{slug}/{slug}.php` as pending; slugs listed
    /// in `misnamed` land under another directory, those in `failing` fail.
    struct FakeInstaller {
        registry: Arc<MemoryRegistry>,
        failing: HashSet<&'static str>,
        misnamed: HashSet<&'static str>,
        contexts: Mutex<Vec<InstallContext>>,
    }

    #[async_trait]
    impl Installer for FakeInstaller {
        async fn install(
            &self,
            download_link: &str,
            context: &InstallContext,
        ) -> Result<InstallOutcome, InstallError> {
            self.contexts.lock().push(*context);
            let slug = download_link
                .rsplit('/')
                .next()
                .and_then(|f| f.strip_suffix(".zip"))
                .unwrap_or_default()
                .to_string();

            if self.failing.contains(slug.as_str()) {
                return Err(InstallError::FolderExists(slug));
            }

            let dir = if self.misnamed.contains(slug.as_str()) {
                format!("{slug}-master")
            } else {
                slug.clone()
            };
            self.registry
                .pending
                .lock()
                .push(package(&format!("{dir}/{slug}.php"), "", false));
            Ok(InstallOutcome { destination: dir })
        }
    }

    #[derive(Default)]
    struct FakeFs {
        removed: Mutex<Vec<PathBuf>>,
        failing: HashSet<PathBuf>,
    }

    #[async_trait]
    impl FileSystem for FakeFs {
        async fn remove_tree(&self, path: &Path) -> Result<(), FileSystemError> {
            if self.failing.contains(path) {
                return Err(FileSystemError::Io {
                    path: path.to_path_buf(),
                    message: "permission denied".to_string(),
                });
            }
            self.removed.lock().push(path.to_path_buf());
            Ok(())
        }
    }

    struct Harness {
        registry: Arc<MemoryRegistry>,
        installer: Arc<FakeInstaller>,
        fs: Arc<FakeFs>,
        orchestrator: BulkOrchestrator,
    }

    fn harness(packages: Vec<InstalledPackage>) -> Harness {
        harness_with(packages, FakeFs::default(), &[], &[])
    }

    fn harness_with(
        packages: Vec<InstalledPackage>,
        fs: FakeFs,
        failing: &[&'static str],
        misnamed: &[&'static str],
    ) -> Harness {
        let registry = MemoryRegistry::with(packages);
        let source = Arc::new(FakeSource {
            known: ["akismet", "hello-dolly", "broken-zip", "odd-layout", "classic-editor"]
                .into_iter()
                .collect(),
        });
        let installer = Arc::new(FakeInstaller {
            registry: Arc::clone(&registry),
            failing: failing.iter().copied().collect(),
            misnamed: misnamed.iter().copied().collect(),
            contexts: Mutex::new(Vec::new()),
        });
        let fs = Arc::new(fs);
        let orchestrator = BulkOrchestrator::new(
            registry.clone(),
            source,
            installer.clone(),
            fs.clone(),
        );
        Harness {
            registry,
            installer,
            fs,
            orchestrator,
        }
    }

    fn ids(slugs: &[&str]) -> Vec<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    fn statuses(results: &[OperationResult<InstallStatus>]) -> Vec<InstallStatus> {
        results.iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn one_result_per_identifier_in_order() {
        let h = harness(vec![package("hello.php", "", false)]);
        let input = ids(&["hello", "nonexistent-xyz", "hello", "Hello"]);

        let results = h
            .orchestrator
            .install_batch(&input, false, BatchOptions::default())
            .await;

        let slugs: Vec<_> = results.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["hello", "nonexistent-xyz", "hello", "Hello"]);
        assert_eq!(
            statuses(&results),
            vec![
                InstallStatus::AlreadyInstalled,
                InstallStatus::Error,
                InstallStatus::AlreadyInstalled,
                InstallStatus::AlreadyInstalled,
            ]
        );
        assert_eq!(results[0].details.plugin_file.as_deref(), Some("hello.php"));
    }

    #[tokio::test]
    async fn already_active_is_idempotent() {
        let h = harness(vec![package("akismet/akismet.php", "akismet", true)]);
        let input = ids(&["akismet"]);

        for _ in 0..2 {
            let results = h
                .orchestrator
                .install_batch(&input, true, BatchOptions::default())
                .await;
            assert_eq!(statuses(&results), vec![InstallStatus::AlreadyActive]);
            assert_eq!(results[0].message, MSG_ALREADY_ACTIVE);
        }
        assert_eq!(h.registry.activations.load(Ordering::SeqCst), 0);
        assert!(h.installer.contexts.lock().is_empty());
    }

    #[tokio::test]
    async fn activates_installed_package_and_reports_source_errors() {
        let h = harness(vec![package("akismet/akismet.php", "akismet", false)]);

        let results = h
            .orchestrator
            .install_batch(&ids(&["akismet", "nonexistent-xyz"]), true, BatchOptions::default())
            .await;

        assert_eq!(
            statuses(&results),
            vec![InstallStatus::Activated, InstallStatus::Error]
        );
        assert_eq!(results[0].message, MSG_ACTIVATED);
        assert_eq!(results[1].message, "Plugin not found.");
        assert_eq!(results[1].details.api_error.as_deref(), Some("plugin_not_found"));
        assert!(h.registry.is_active("akismet/akismet.php"));

        let report = summarize_install(&results);
        assert_eq!(report.summary.activated, 1);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.errors[0].slug, "nonexistent-xyz");
    }

    #[tokio::test]
    async fn activation_failure_keeps_underlying_message() {
        let h = harness(vec![package("woo-addon/woo-addon.php", "", false)]);
        h.registry.break_activation("woo-addon/woo-addon.php");

        let results = h
            .orchestrator
            .install_batch(&ids(&["woo-addon"]), true, BatchOptions::default())
            .await;

        assert_eq!(statuses(&results), vec![InstallStatus::ActivationFailed]);
        assert!(results[0].message.contains("woocommerce"));
        assert_eq!(
            results[0].details.plugin_file.as_deref(),
            Some("woo-addon/woo-addon.php")
        );
    }

    #[tokio::test]
    async fn installs_and_activates_missing_package() {
        let h = harness(Vec::new());

        let results = h
            .orchestrator
            .install_batch(&ids(&["hello-dolly"]), true, BatchOptions::default())
            .await;

        let result = &results[0];
        assert_eq!(result.status, InstallStatus::InstalledActivated);
        assert_eq!(result.message, MSG_INSTALLED_ACTIVATED);
        assert_eq!(
            result.details.plugin_file.as_deref(),
            Some("hello-dolly/hello-dolly.php")
        );
        let info = result.details.plugin_info.as_ref().unwrap();
        assert_eq!(info.name, "Remote hello-dolly");
        assert!(h.registry.is_active("hello-dolly/hello-dolly.php"));
    }

    #[tokio::test]
    async fn install_without_activation() {
        let h = harness(Vec::new());

        let results = h
            .orchestrator
            .install_batch(&ids(&["classic-editor"]), false, BatchOptions::default())
            .await;

        assert_eq!(statuses(&results), vec![InstallStatus::Installed]);
        assert_eq!(h.registry.activations.load(Ordering::SeqCst), 0);
        assert_eq!(
            summarize_install(&results).installed,
            vec!["classic-editor".to_string()]
        );
    }

    #[tokio::test]
    async fn installed_activation_failure() {
        let h = harness(Vec::new());
        h.registry.break_activation("akismet/akismet.php");

        let results = h
            .orchestrator
            .install_batch(&ids(&["akismet"]), true, BatchOptions::default())
            .await;

        assert_eq!(statuses(&results), vec![InstallStatus::InstalledActivationFailed]);
        assert!(
            results[0]
                .message
                .starts_with("Plugin installed but activation failed: ")
        );
        assert_eq!(summarize_install(&results).summary.errors, 1);
    }

    #[tokio::test]
    async fn installed_but_unresolvable_has_no_file() {
        let h = harness_with(Vec::new(), FakeFs::default(), &[], &["odd-layout"]);

        let results = h
            .orchestrator
            .install_batch(&ids(&["odd-layout"]), true, BatchOptions::default())
            .await;

        assert_eq!(statuses(&results), vec![InstallStatus::Installed]);
        assert!(results[0].details.plugin_file.is_none());
        assert!(results[0].details.plugin_info.is_some());
        assert_eq!(h.registry.activations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn install_failure_reports_installer_code() {
        let h = harness_with(Vec::new(), FakeFs::default(), &["broken-zip"], &[]);

        let results = h
            .orchestrator
            .install_batch(&ids(&["broken-zip"]), false, BatchOptions::default())
            .await;

        let result = &results[0];
        assert_eq!(result.status, InstallStatus::Error);
        assert_eq!(result.details.install_error.as_deref(), Some("folder_exists"));
        assert!(result.details.plugin_info.is_some());
    }

    #[tokio::test]
    async fn panic_is_contained_to_its_item() {
        let h = harness(vec![package("hello.php", "", true)]);

        let results = h
            .orchestrator
            .install_batch(&ids(&["boom", "hello"]), false, BatchOptions::default())
            .await;

        assert_eq!(
            statuses(&results),
            vec![InstallStatus::Error, InstallStatus::AlreadyActive]
        );
        assert_eq!(results[0].message, "source exploded");
        assert_eq!(results[0].details.exception.as_deref(), Some("Panic"));
        // The lock taken by the panicking item was released.
        assert!(h.orchestrator.locks.is_empty());
    }

    #[tokio::test]
    async fn identifier_without_safe_characters_is_an_error() {
        let h = harness(Vec::new());

        let results = h
            .orchestrator
            .install_batch(&ids(&["../..", ""]), false, BatchOptions::default())
            .await;

        assert_eq!(statuses(&results), vec![InstallStatus::Error, InstallStatus::Error]);
        assert_eq!(results[0].details.exception.as_deref(), Some("ValidationError"));
    }

    #[tokio::test]
    async fn batch_options_reach_the_installer() {
        let h = harness(Vec::new());

        h.orchestrator
            .install_batch(
                &ids(&["akismet", "hello-dolly"]),
                false,
                BatchOptions {
                    suppress_maintenance: true,
                },
            )
            .await;

        let contexts = h.installer.contexts.lock();
        assert_eq!(contexts.len(), 2);
        assert!(contexts.iter().all(|c| c.suppress_maintenance));
    }

    #[tokio::test]
    async fn delete_unknown_identifier_touches_nothing() {
        let h = harness(vec![package("wp-seo/main.php", "wordpress-seo", true)]);

        let report = h
            .orchestrator
            .deactivate_and_delete(&ids(&["nonexistent-xyz", "wordpress-seo"]))
            .await;

        let statuses: Vec<_> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![DeleteStatus::NotFound, DeleteStatus::NotFound]);
        assert_eq!(report.results[0].message, MSG_NOT_FOUND);
        assert!(h.fs.removed.lock().is_empty());
        assert_eq!(h.registry.deactivations.load(Ordering::SeqCst), 0);
        assert_eq!(
            report.summary,
            DeleteSummary {
                total: 2,
                deactivated: 0,
                deleted: 0,
                errors: 2,
            }
        );
    }

    #[tokio::test]
    async fn deletes_active_and_inactive_packages() {
        let h = harness(vec![
            package("akismet/akismet.php", "akismet", true),
            package("hello.php", "", false),
        ]);

        let report = h
            .orchestrator
            .deactivate_and_delete(&ids(&["akismet", "hello"]))
            .await;

        assert_eq!(report.results[0].status, DeleteStatus::Deleted);
        assert_eq!(report.results[0].message, "Deactivated. Deleted successfully.");
        assert_eq!(report.results[1].message, "Deleted successfully.");
        assert_eq!(
            *h.fs.removed.lock(),
            vec![
                PathBuf::from("/packages/akismet"),
                PathBuf::from("/packages/hello.php")
            ]
        );
        assert!(!h.registry.is_active("akismet/akismet.php"));
        assert_eq!(
            report.summary,
            DeleteSummary {
                total: 2,
                deactivated: 1,
                deleted: 2,
                errors: 0,
            }
        );
    }

    #[tokio::test]
    async fn partial_failure_mentions_deactivation() {
        let fs = FakeFs {
            failing: [PathBuf::from("/packages/akismet")].into_iter().collect(),
            ..Default::default()
        };
        let h = harness_with(
            vec![package("akismet/akismet.php", "akismet", true)],
            fs,
            &[],
            &[],
        );

        let report = h.orchestrator.deactivate_and_delete(&ids(&["akismet"])).await;

        let result = &report.results[0];
        assert_eq!(result.status, DeleteStatus::DeleteFailed);
        assert_eq!(result.message, "Deactivated. Failed to delete package files.");
        assert!(result.details.delete_error.as_deref().unwrap().contains("permission denied"));
        assert_eq!(report.summary.deactivated, 1);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(h.registry.files(), vec!["akismet/akismet.php"]);
    }

    #[tokio::test]
    async fn metrics_count_items() {
        let metrics = Arc::new(Metrics::new());
        let h = harness(vec![package("hello.php", "", false)]);
        let orchestrator = h.orchestrator.clone().with_metrics(Arc::clone(&metrics));

        orchestrator
            .install_batch(&ids(&["hello"]), false, BatchOptions::default())
            .await;
        orchestrator.deactivate_and_delete(&ids(&["ghost"])).await;

        let output = metrics.encode();
        assert!(output.contains(r#"status="already_installed""#));
        assert!(output.contains(r#"status="not_found""#));
    }
}
