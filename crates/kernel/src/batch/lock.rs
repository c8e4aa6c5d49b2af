//! Per-identifier mutual exclusion across concurrent batches.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Table of async locks keyed by normalized slug.
///
/// Entries exist only while someone holds or waits for the lock.
#[derive(Clone, Default)]
pub struct IdentifierLocks {
    table: LockTable,
}

impl IdentifierLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `slug`.
    pub async fn acquire(&self, slug: &str) -> IdentifierGuard {
        let mutex = Arc::clone(self.table.entry(slug.to_string()).or_default().value());
        let guard = mutex.lock_owned().await;

        IdentifierGuard {
            slug: slug.to_string(),
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Number of identifiers currently locked or awaited.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Held lock on one identifier; released and pruned on drop.
pub struct IdentifierGuard {
    slug: String,
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdentifierGuard {
    fn drop(&mut self) {
        // Release first so the table holds the only reference when idle.
        self.guard.take();
        self.table
            .remove_if(&self.slug, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
