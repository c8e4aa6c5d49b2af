//! Slug resolution against a registry snapshot.
//!
//! Resolution rules, each scanning the whole snapshot in registry order
//! before the next rule is tried:
//!
//! 1. single-file package whose main file is `{slug}.php`
//! 2. directory package whose main file lives under `{slug}/`
//! 3. package whose declared text domain equals `{slug}`
//!
//! A single-file `foo.php` therefore wins over a `foo/bar.php` directory
//! package, and over any package whose text domain happens to be `foo`.

use super::InstalledPackage;

/// Extension of package main files.
pub const MAIN_FILE_EXT: &str = "php";

/// Resolve a slug to an installed package.
pub fn resolve<'a>(identifier: &str, snapshot: &'a [InstalledPackage]) -> Option<&'a InstalledPackage> {
    if identifier.is_empty() {
        return None;
    }

    let single_file = format!("{identifier}.{MAIN_FILE_EXT}");
    let dir_prefix = format!("{identifier}/");

    snapshot
        .iter()
        .find(|p| p.file == single_file)
        .or_else(|| snapshot.iter().find(|p| p.file.starts_with(&dir_prefix)))
        .or_else(|| {
            snapshot
                .iter()
                .find(|p| !p.header.text_domain.is_empty() && p.header.text_domain == identifier)
        })
}

/// Resolve a slug using only the inverse of [`slug_for_file`].
///
/// Deletion uses this stricter rule so a text-domain coincidence can never
/// select a package for removal.
pub fn resolve_by_slug<'a>(
    identifier: &str,
    snapshot: &'a [InstalledPackage],
) -> Option<&'a InstalledPackage> {
    snapshot.iter().find(|p| slug_for_file(&p.file) == identifier)
}

/// Derive the slug of a package from its main file path.
///
/// `akismet/akismet.php` → `akismet`, `hello.php` → `hello`.
pub fn slug_for_file(file: &str) -> &str {
    match file.split_once('/') {
        Some((dir, _)) => dir,
        None => file
            .strip_suffix(MAIN_FILE_EXT)
            .and_then(|s| s.strip_suffix('.'))
            .unwrap_or(file),
    }
}

/// Normalize a caller-supplied identifier.
///
/// Lowercases ASCII letters and drops everything outside `[a-z0-9_-]`.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}
