//! HTTP package source speaking the WordPress.org `plugin_information` API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{PackageSource, RemotePackageInfo, SourceError};

/// Package source backed by a `plugins/info/1.2/` style endpoint.
#[derive(Clone)]
pub struct HttpPackageSource {
    client: reqwest::Client,
    api_url: Url,
}

impl HttpPackageSource {
    /// Create a source for `api_url` with the given outbound timeout.
    pub fn new(api_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let api_url = Url::parse(api_url).context("SOURCE_API_URL must be a valid URL")?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("plugport/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, api_url })
    }

    fn info_url(&self, slug: &str) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("action", "plugin_information")
            .append_pair("request[slug]", slug);
        url
    }
}

#[async_trait]
impl PackageSource for HttpPackageSource {
    async fn fetch_info(&self, slug: &str) -> Result<RemotePackageInfo, SourceError> {
        let url = self.info_url(slug);
        debug!(slug = %slug, url = %url, "querying package source");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(slug = %slug, error = %e, "package source request failed");
            SourceError::Unavailable(format!(
                "An unexpected error occurred while contacting the package source: {e}"
            ))
        })?;

        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        // The API reports unknown slugs as `{"error": "..."}`, usually with a 404.
        if let Some(message) = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(Value::as_str)
        {
            return Err(SourceError::NotFound(message.to_string()));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound("Plugin not found.".to_string()));
        }

        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "Package source returned HTTP {status}"
            )));
        }

        let body = body.ok_or_else(|| {
            SourceError::InvalidResponse("Package source returned a non-JSON body".to_string())
        })?;

        parse_info(&body)
    }
}

/// Extract package metadata from a `plugin_information` response body.
pub(crate) fn parse_info(body: &Value) -> Result<RemotePackageInfo, SourceError> {
    let name = string_field(body, "name");
    let download_link = string_field(body, "download_link");

    if name.is_empty() || download_link.is_empty() {
        return Err(SourceError::InvalidResponse(
            "Package source response is missing name or download_link".to_string(),
        ));
    }

    Ok(RemotePackageInfo {
        name,
        version: string_field(body, "version"),
        author: strip_tags(&string_field(body, "author")),
        requires: string_field(body, "requires"),
        tested: string_field(body, "tested"),
        downloaded: body.get("downloaded").and_then(Value::as_u64).unwrap_or(0),
        rating: body.get("rating").and_then(Value::as_f64).unwrap_or(0.0),
        num_ratings: body.get("num_ratings").and_then(Value::as_u64).unwrap_or(0),
        download_link,
    })
}

/// String-valued field; `false`, numbers and absent keys become text or empty.
fn string_field(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Author fields arrive as an HTML link; keep only the text.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}
