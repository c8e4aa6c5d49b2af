//! Bulk package operations.
//!
//! Install, activate and deactivate+delete batches of packages named by
//! slug. A batch always produces one result per requested slug, in request
//! order; failures are confined to the item they happen on.

mod error;
mod lock;
mod service;
mod types;

pub use error::OperationError;
pub use lock::{IdentifierGuard, IdentifierLocks};
pub use service::BulkOrchestrator;
pub use types::{
    BatchError, BatchOptions, DeleteReport, DeleteStatus, DeleteSummary, InstallReport,
    InstallStatus, InstallSummary, OperationResult, ResultDetails, summarize_install,
};
