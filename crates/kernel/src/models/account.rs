//! Accounts allowed to operate the service.
//!
//! Accounts are read from a TOML file at startup:
//!
//! ```toml
//! [[account]]
//! name = "admin"
//! password_hash = "$argon2id$v=19$..."
//! is_admin = true
//!
//! [[account]]
//! name = "deployer"
//! password_hash = "$argon2id$v=19$..."
//! capabilities = ["install_plugins", "activate_plugins"]
//! api_token_hashes = ["9f86d081884c7d65..."]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::api_token::token_matches;
use crate::permissions::Capability;

/// A principal that can log in or present an API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,

    /// Argon2 PHC string; an empty hash disables password login.
    #[serde(default)]
    pub password_hash: String,

    /// Administrators hold every capability.
    #[serde(default)]
    pub is_admin: bool,

    #[serde(default)]
    pub capabilities: Vec<Capability>,

    /// SHA-256 hex digests of API tokens.
    #[serde(default)]
    pub api_token_hashes: Vec<String>,
}

impl Account {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.is_admin || self.capabilities.contains(&capability)
    }

    /// Verify a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    account: Vec<Account>,
}

/// In-memory account list.
#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Load accounts from a TOML file. A missing file yields no accounts.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "accounts file not found, no one can log in");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read accounts file: {}", path.display()))?;
        let store = Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse accounts file: {}", path.display()))?;

        info!(path = %path.display(), count = store.accounts.len(), "accounts loaded");
        Ok(store)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: AccountsFile = toml::from_str(content)?;

        let mut seen = std::collections::HashSet::new();
        for account in &file.account {
            if account.name.trim().is_empty() {
                anyhow::bail!("account with empty name");
            }
            if !seen.insert(account.name.as_str()) {
                anyhow::bail!("duplicate account name: {}", account.name);
            }
        }

        Ok(Self {
            accounts: file.account,
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Find the account owning a raw API token.
    pub fn find_by_token(&self, raw: &str) -> Option<&Account> {
        if raw.is_empty() {
            return None;
        }
        self.accounts
            .iter()
            .find(|a| a.api_token_hashes.iter().any(|h| token_matches(raw, h)))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
