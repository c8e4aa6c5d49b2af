//! Plugport kernel library.
//!
//! Bulk install, activate, deactivate+delete and status operations over a
//! plugin tree, exposed over HTTP. The `plugport` binary is a thin wrapper
//! around [`routes::app`].

pub mod batch;
pub mod config;
pub mod error;
pub mod file;
pub mod installer;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod nonce;
pub mod permissions;
pub mod registry;
pub mod report;
pub mod routes;
pub mod session;
pub mod source;
pub mod state;
