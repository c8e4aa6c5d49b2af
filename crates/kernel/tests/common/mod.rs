#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] runs the real router, sessions, registry and file
//! system against its own temporary directory. Only the two network-facing
//! collaborators are replaced: [`FakeSource`] serves metadata from memory
//! and [`FakeInstaller`] writes package fixtures instead of downloading.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use plugport_kernel::config::Config;
use plugport_kernel::file::LocalFileSystem;
use plugport_kernel::installer::{InstallContext, InstallError, InstallOutcome, Installer};
use plugport_kernel::models::AccountStore;
use plugport_kernel::models::api_token::hash_token;
use plugport_kernel::registry::LocalRegistry;
use plugport_kernel::routes;
use plugport_kernel::source::{PackageSource, RemotePackageInfo, SourceError};
use plugport_kernel::state::AppState;
use plugport_test_utils::{AccountsFile, PackageFixture};

pub const ADMIN: &str = "admin";
pub const VIEWER: &str = "viewer";
pub const PASSWORD: &str = "correct horse battery staple";
pub const DEPLOY_TOKEN: &str = "deploy-token-0123456789abcdef";

/// Package metadata served from memory. Unknown slugs are not found.
#[derive(Default)]
pub struct FakeSource {
    packages: HashMap<String, RemotePackageInfo>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    /// Publish `slug`; the download link is the slug itself.
    pub fn publish(mut self, slug: &str) -> Self {
        self.packages.insert(
            slug.to_string(),
            RemotePackageInfo {
                name: format!("Remote {slug}"),
                version: "2.0.0".to_string(),
                author: "Remote Author".to_string(),
                download_link: slug.to_string(),
                ..Default::default()
            },
        );
        self
    }
}

#[async_trait]
impl PackageSource for FakeSource {
    async fn fetch_info(&self, slug: &str) -> Result<RemotePackageInfo, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.packages
            .get(slug)
            .cloned()
            .ok_or_else(|| SourceError::NotFound("Plugin not found.".to_string()))
    }
}

/// Writes a fixture for the requested download link into the packages root.
pub struct FakeInstaller {
    root: PathBuf,
    fixtures: HashMap<String, PackageFixture>,
    pub calls: AtomicUsize,
}

impl FakeInstaller {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            fixtures: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Installing `link` lays down `fixture`.
    pub fn serve(mut self, link: &str, fixture: PackageFixture) -> Self {
        self.fixtures.insert(link.to_string(), fixture);
        self
    }
}

#[async_trait]
impl Installer for FakeInstaller {
    async fn install(
        &self,
        download_link: &str,
        _context: &InstallContext,
    ) -> Result<InstallOutcome, InstallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fixture = self
            .fixtures
            .get(download_link)
            .ok_or_else(|| InstallError::DownloadFailed("Not Found".to_string()))?;
        fixture
            .write_to(&self.root)
            .map_err(|e| InstallError::CopyFailed(e.to_string()))?;
        Ok(InstallOutcome {
            destination: fixture.relative_main_file(),
        })
    }
}

/// Builder for [`TestApp`].
pub struct TestAppBuilder {
    dir: TempDir,
    source: FakeSource,
    installer_fixtures: Vec<(String, PackageFixture)>,
    installed: Vec<PackageFixture>,
    active: Vec<String>,
    max_batch_size: usize,
}

impl TestAppBuilder {
    /// A package already on disk before the app starts.
    pub fn installed(mut self, fixture: PackageFixture) -> Self {
        self.installed.push(fixture);
        self
    }

    /// Mark a main file active before the app starts.
    pub fn active(mut self, file: &str) -> Self {
        self.active.push(file.to_string());
        self
    }

    /// A package the source knows and the installer can lay down.
    pub fn remote(mut self, slug: &str, fixture: PackageFixture) -> Self {
        self.source = self.source.publish(slug);
        self.installer_fixtures.push((slug.to_string(), fixture));
        self
    }

    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    pub async fn build(self) -> TestApp {
        let mut config = Config::for_dir(self.dir.path());
        config.max_batch_size = self.max_batch_size;

        std::fs::create_dir_all(&config.packages_dir).unwrap();
        std::fs::create_dir_all(&config.state_dir).unwrap();
        for fixture in &self.installed {
            fixture.write_to(&config.packages_dir).unwrap();
        }
        if !self.active.is_empty() {
            std::fs::write(
                config.state_dir.join("active-packages.json"),
                serde_json::to_vec(&self.active).unwrap(),
            )
            .unwrap();
        }

        let password_hash = plugport_kernel::models::hash_password(PASSWORD).unwrap();
        let accounts = AccountsFile::new()
            .account(ADMIN, &password_hash, &["install_plugins", "activate_plugins"], &[])
            .account(VIEWER, &password_hash, &[], &[])
            .account("deployer", "", &["install_plugins"], &[hash_token(DEPLOY_TOKEN).as_str()])
            .render();
        let accounts = AccountStore::from_toml_str(&accounts).unwrap();

        let registry = Arc::new(LocalRegistry::open(&config.packages_dir, &config.state_dir).unwrap());
        let source = Arc::new(self.source);
        let installer = self
            .installer_fixtures
            .into_iter()
            .fold(FakeInstaller::new(&config.packages_dir), |installer, (link, fixture)| {
                installer.serve(&link, fixture)
            });
        let installer = Arc::new(installer);
        let fs = Arc::new(LocalFileSystem::new(&config.packages_dir));

        let packages_dir = config.packages_dir.clone();
        let state = AppState::new(
            config,
            accounts,
            registry,
            source.clone(),
            installer.clone(),
            fs,
        );
        let router = routes::app(state.clone()).await.unwrap();

        TestApp {
            _dir: self.dir,
            packages_dir,
            router,
            state,
            source,
            installer,
        }
    }
}

/// Test application wrapper using the real kernel routes and state.
pub struct TestApp {
    _dir: TempDir,
    pub packages_dir: PathBuf,
    router: Router,
    pub state: AppState,
    pub source: Arc<FakeSource>,
    pub installer: Arc<FakeInstaller>,
}

/// A logged-in browser: session cookie plus the nonce handed out at login.
#[derive(Debug, Clone)]
pub struct Browser {
    pub cookie: String,
    pub nonce: String,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            dir: tempfile::tempdir().unwrap(),
            source: FakeSource::default(),
            installer_fixtures: Vec::new(),
            installed: Vec::new(),
            active: Vec::new(),
            max_batch_size: 100,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Log in and return the session cookie and REST nonce.
    pub async fn login(&self, username: &str) -> Browser {
        let response = self
            .request(
                Request::post("/user/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "username": username, "password": PASSWORD })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed for {username}");

        let cookie = session_cookie(&response);
        let body = json_body(response).await;
        Browser {
            cookie,
            nonce: body["nonce"].as_str().unwrap_or_default().to_string(),
        }
    }

    /// POST JSON as a logged-in browser, echoing its nonce.
    pub async fn post_json(&self, path: &str, browser: &Browser, body: Value) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, &browser.cookie)
            .header("X-WP-Nonce", &browser.nonce)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.request(request).await;
        (response.status(), json_body(response).await)
    }

    /// GET as a logged-in browser.
    pub async fn get(&self, path: &str, browser: &Browser) -> (StatusCode, Value) {
        let request = Request::get(path)
            .header(header::COOKIE, &browser.cookie)
            .body(Body::empty())
            .unwrap();
        let response = self.request(request).await;
        (response.status(), json_body(response).await)
    }

    /// POST JSON with a bearer token and no cookie.
    pub async fn post_with_token(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.request(request).await;
        (response.status(), json_body(response).await)
    }

    /// POST a form to `/ajax` as a logged-in browser.
    pub async fn post_ajax(&self, browser: &Browser, form: &[(&str, &str)]) -> (StatusCode, Value) {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let request = Request::post("/ajax")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, &browser.cookie)
            .body(Body::from(encoded))
            .unwrap();
        let response = self.request(request).await;
        (response.status(), json_body(response).await)
    }

    pub fn source_calls(&self) -> usize {
        self.source.calls.load(Ordering::SeqCst)
    }

    pub fn installer_calls(&self) -> usize {
        self.installer.calls.load(Ordering::SeqCst)
    }
}

/// `name=value` of the session cookie set by a response.
pub fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Read a response body as JSON (`Value::Null` when empty or not JSON).
pub async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
