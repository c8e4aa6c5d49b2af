//! Plugport test utilities.
//!
//! Helpers for integration testing: package tree fixtures, zip archive
//! builders, and assertion utilities for batch responses.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

/// How a fixture package is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `{slug}.php` directly under the packages root.
    SingleFile,
    /// `{slug}/{main_file}` with optional extra files.
    Directory,
}

/// A package fixture builder.
#[derive(Debug, Clone)]
pub struct PackageFixture {
    pub slug: String,
    pub layout: Layout,
    pub main_file: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub text_domain: Option<String>,
    pub requires: Vec<String>,
    pub extra_files: Vec<(String, String)>,
}

impl PackageFixture {
    /// A directory package `{slug}/{slug}.php`.
    pub fn directory(slug: &str) -> Self {
        Self::new(slug, Layout::Directory)
    }

    /// A single-file package `{slug}.php`.
    pub fn single_file(slug: &str) -> Self {
        Self::new(slug, Layout::SingleFile)
    }

    fn new(slug: &str, layout: Layout) -> Self {
        Self {
            slug: slug.to_string(),
            layout,
            main_file: format!("{slug}.php"),
            name: format!("Test Package {slug}"),
            version: "1.0.0".to_string(),
            author: "Test Author".to_string(),
            description: format!("Fixture package {slug}"),
            text_domain: None,
            requires: Vec::new(),
            extra_files: Vec::new(),
        }
    }

    /// Use a different main file name inside the package directory.
    pub fn main_file(mut self, file: &str) -> Self {
        self.main_file = file.to_string();
        self
    }

    /// Set the display name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the version.
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Set the text domain header.
    pub fn text_domain(mut self, domain: &str) -> Self {
        self.text_domain = Some(domain.to_string());
        self
    }

    /// Declare required packages.
    pub fn requires(mut self, slugs: &[&str]) -> Self {
        self.requires = slugs.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a file next to the main file (directory packages only).
    pub fn with_file(mut self, relative: &str, content: &str) -> Self {
        self.extra_files
            .push((relative.to_string(), content.to_string()));
        self
    }

    /// Main file path relative to the packages root.
    pub fn relative_main_file(&self) -> String {
        match self.layout {
            Layout::SingleFile => self.main_file.clone(),
            Layout::Directory => format!("{}/{}", self.slug, self.main_file),
        }
    }

    /// Content of the main file, header block included.
    pub fn header_source(&self) -> String {
        let mut out = String::from("<?php\n/**\n");
        out.push_str(&format!(" * Plugin Name: {}\n", self.name));
        out.push_str(&format!(" * Description: {}\n", self.description));
        out.push_str(&format!(" * Version: {}\n", self.version));
        out.push_str(&format!(" * Author: {}\n", self.author));
        out.push_str(&format!(" * Plugin URI: https://example.org/{}\n", self.slug));
        if let Some(domain) = &self.text_domain {
            out.push_str(&format!(" * Text Domain: {domain}\n"));
        }
        if !self.requires.is_empty() {
            out.push_str(&format!(" * Requires Plugins: {}\n", self.requires.join(", ")));
        }
        out.push_str(" */\n");
        out
    }

    /// Write the package under `root`, returning the main file path.
    pub fn write_to(&self, root: &Path) -> std::io::Result<PathBuf> {
        let main_path = root.join(self.relative_main_file());
        if let Some(parent) = main_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&main_path, self.header_source())?;

        if self.layout == Layout::Directory {
            for (relative, content) in &self.extra_files {
                let path = root.join(&self.slug).join(relative);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, content)?;
            }
        }

        Ok(main_path)
    }

    /// Build a zip archive of the package as a package source would ship it.
    ///
    /// Directory packages are archived under a top-level `{slug}/` folder.
    pub fn to_zip(&self) -> zip::result::ZipResult<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(self.relative_main_file(), options)?;
        zip.write_all(self.header_source().as_bytes())?;

        if self.layout == Layout::Directory {
            for (relative, content) in &self.extra_files {
                zip.start_file(format!("{}/{}", self.slug, relative), options)?;
                zip.write_all(content.as_bytes())?;
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// An `accounts.toml` document builder.
#[derive(Debug, Clone, Default)]
pub struct AccountsFile {
    entries: Vec<String>,
}

impl AccountsFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account with a pre-computed argon2 password hash.
    pub fn account(
        mut self,
        name: &str,
        password_hash: &str,
        capabilities: &[&str],
        token_hashes: &[&str],
    ) -> Self {
        let quote = |items: &[&str]| {
            items
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.entries.push(format!(
            "[[account]]\nname = \"{name}\"\npassword_hash = \"{password_hash}\"\ncapabilities = [{}]\napi_token_hashes = [{}]\n",
            quote(capabilities),
            quote(token_hashes),
        ));
        self
    }

    /// Render as TOML.
    pub fn render(&self) -> String {
        self.entries.join("\n")
    }
}

/// Assertion helpers for batch responses.
pub mod assert {
    use serde_json::Value;

    /// Assert the per-item statuses of a `results` array, in order.
    pub fn statuses(body: &Value, expected: &[&str]) {
        let actual: Vec<&str> = body["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|r| r["status"].as_str().unwrap_or("<missing>"))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(actual, expected, "unexpected statuses in: {body}");
    }

    /// Assert the slugs of a `results` array, in order.
    pub fn slugs(body: &Value, expected: &[&str]) {
        let actual: Vec<&str> = body["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|r| r["slug"].as_str().unwrap_or("<missing>"))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(actual, expected, "unexpected slugs in: {body}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }
}
