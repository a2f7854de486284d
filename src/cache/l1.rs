//! In-process front for the durable log.

use std::sync::Arc;

use moka::sync::Cache;

use crate::document::ResultSet;
use crate::hashing::Fingerprint;

#[derive(Clone)]
pub struct L1Cache {
    cache: Cache<Fingerprint, Arc<ResultSet>>,
}

impl L1Cache {
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<ResultSet>> {
        self.cache.get(fingerprint)
    }

    pub fn insert(&self, fingerprint: Fingerprint, results: Arc<ResultSet>) {
        self.cache.insert(fingerprint, results);
    }

    pub fn remove(&self, fingerprint: &Fingerprint) {
        self.cache.invalidate(fingerprint);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Approximate; moka applies writes lazily.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for L1Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Cache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
