//! Parser for package main-file headers.
//!
//! A package's main file carries its metadata in a leading comment block:
//!
//! ```text
//! <?php
//! /**
//!  * Plugin Name: Akismet Anti-spam
//!  * Version: 5.3
//!  * Text Domain: akismet
//!  */
//! ```
//!
//! Only the first [`HEADER_SCAN_BYTES`] of a file are examined. A file is a
//! package main file only if it declares a non-empty `Plugin Name`.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// How much of a file is read when looking for header fields.
pub const HEADER_SCAN_BYTES: usize = 8 * 1024;

/// Metadata declared in a package main file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageHeader {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "PluginURI")]
    pub plugin_uri: String,

    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Author")]
    pub author: String,

    #[serde(rename = "AuthorURI")]
    pub author_uri: String,

    #[serde(rename = "TextDomain")]
    pub text_domain: String,

    #[serde(rename = "RequiresWP")]
    pub requires_at_least: String,

    /// Slugs of packages that must be active before this one can be.
    #[serde(rename = "RequiresPlugins")]
    pub requires_plugins: Vec<String>,
}

impl PackageHeader {
    /// Read and parse the header of the file at `path`.
    ///
    /// Returns `Ok(None)` when the file has no `Plugin Name` field.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open package file: {}", path.display()))?;

        let mut buf = Vec::with_capacity(HEADER_SCAN_BYTES);
        file.take(HEADER_SCAN_BYTES as u64)
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to read package file: {}", path.display()))?;

        Ok(Self::parse_str(&String::from_utf8_lossy(&buf)))
    }

    /// Parse header fields out of file content.
    pub fn parse_str(content: &str) -> Option<Self> {
        let mut header = PackageHeader::default();

        for line in content.lines() {
            let Some((key, value)) = split_header_line(line) else {
                continue;
            };

            // First occurrence wins, later duplicates are ignored.
            let slot = match key.to_ascii_lowercase().as_str() {
                "plugin name" => &mut header.name,
                "plugin uri" => &mut header.plugin_uri,
                "version" => &mut header.version,
                "description" => &mut header.description,
                "author" => &mut header.author,
                "author uri" => &mut header.author_uri,
                "text domain" => &mut header.text_domain,
                "requires at least" => &mut header.requires_at_least,
                "requires plugins" => {
                    if header.requires_plugins.is_empty() {
                        header.requires_plugins = value
                            .split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect();
                    }
                    continue;
                }
                _ => continue,
            };

            if slot.is_empty() {
                *slot = value;
            }
        }

        if header.name.is_empty() {
            None
        } else {
            Some(header)
        }
    }
}

/// Split a comment line into a `(key, value)` pair.
///
/// Leading `<?php`, whitespace and comment decoration (`/ * # @`) are
/// stripped; a trailing `*/` is dropped from the value.
fn split_header_line(line: &str) -> Option<(&str, String)> {
    let mut rest = line.trim_start();
    if let Some(stripped) = rest.strip_prefix("<?php") {
        rest = stripped;
    }
    let rest = rest.trim_start_matches([' ', '\t', '/', '*', '#', '@']);

    let (key, value) = rest.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.len() > 32 {
        return None;
    }

    let value = value.trim();
    let value = value.strip_suffix("*/").unwrap_or(value).trim();
    Some((key, value.to_string()))
}
