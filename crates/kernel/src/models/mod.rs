//! Account and credential models.

pub mod account;
pub mod api_token;

pub use account::{Account, AccountStore, hash_password};
