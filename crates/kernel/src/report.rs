//! Status reporting.
//!
//! Read-only projections of the registry. Each call reads one snapshot and
//! never queries the package source.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::registry::{
    PackageHeader, PackageRegistry, RegistryError, normalize_identifier, resolve,
};

/// Installation state of one requested slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageStatus {
    pub installed: bool,
    pub active: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_data: Option<PackageHeader>,
}

/// One row of the installed package listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledEntry {
    pub slug: String,
    pub file: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub url: String,
    pub is_active: bool,
    pub is_deactivated: bool,
}

/// Status for each requested slug, keyed by the slug as sent.
pub async fn get_status(
    registry: &dyn PackageRegistry,
    identifiers: &[String],
) -> Result<BTreeMap<String, PackageStatus>, RegistryError> {
    let snapshot = registry.snapshot().await?;

    Ok(identifiers
        .iter()
        .map(|raw| {
            let status = match resolve(&normalize_identifier(raw), &snapshot) {
                Some(package) => PackageStatus {
                    installed: true,
                    active: package.active,
                    plugin_file: Some(package.file.clone()),
                    plugin_data: Some(package.header.clone()),
                },
                None => PackageStatus {
                    installed: false,
                    active: false,
                    plugin_file: None,
                    plugin_data: None,
                },
            };
            (raw.clone(), status)
        })
        .collect())
}

/// Every installed package, in registry order.
pub async fn list_installed(
    registry: &dyn PackageRegistry,
) -> Result<Vec<InstalledEntry>, RegistryError> {
    let snapshot = registry.snapshot().await?;

    Ok(snapshot
        .into_iter()
        .map(|package| InstalledEntry {
            slug: package.slug().to_string(),
            is_active: package.active,
            is_deactivated: !package.active,
            name: package.header.name,
            version: package.header.version,
            author: package.header.author,
            description: package.header.description,
            url: package.header.plugin_uri,
            file: package.file,
        })
        .collect())
}
