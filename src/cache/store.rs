use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, instrument};

use super::error::{CacheError, CacheResult};
use super::l1::L1Cache;
use super::log::{CompactionReport, ResultLog};
use crate::document::ResultSet;
use crate::hashing::Fingerprint;

pub const DEFAULT_L1_CAPACITY: u64 = 10_000;

/// Per-fingerprint lock stripes pairing each log operation with its L1 update.
const LOCK_STRIPES: usize = 32;

/// Durable fingerprint-to-results mapping used by the pipeline.
///
/// Implementations do blocking I/O; async callers go through `spawn_blocking`.
pub trait ResultStore: Send + Sync + 'static {
    fn get(&self, fingerprint: &Fingerprint) -> CacheResult<Option<ResultSet>>;

    fn set(&self, fingerprint: Fingerprint, results: &ResultSet) -> CacheResult<()>;

    fn clear(&self) -> CacheResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`ResultLog`] with an L1 front.
///
/// L1 only ever holds values that were durably written or durably read, so a
/// hit in either tier returns the same bytes. A log read or write and the L1
/// update that follows it run under the fingerprint's stripe lock; `clear` and
/// log rebuilds take every stripe before emptying L1.
pub struct ResultCache {
    l1: L1Cache,
    log: ResultLog,
    stripes: [RwLock<()>; LOCK_STRIPES],
    /// Log generation the current L1 contents were filled under.
    l1_generation: AtomicU64,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("l1", &self.l1)
            .field("log", &self.log)
            .finish()
    }
}

impl ResultCache {
    pub fn open(path: impl Into<PathBuf>, l1_capacity: u64) -> CacheResult<Self> {
        let log = ResultLog::open(path)?;
        Ok(Self {
            l1: L1Cache::with_capacity(l1_capacity),
            l1_generation: AtomicU64::new(log.generation()),
            stripes: std::array::from_fn(|_| RwLock::new(())),
            log,
        })
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    pub fn l1(&self) -> &L1Cache {
        &self.l1
    }

    pub fn size_bytes(&self) -> u64 {
        self.log.size_bytes()
    }

    pub fn compact(&self) -> CacheResult<CompactionReport> {
        self.log.compact()
    }

    fn stripe(&self, fingerprint: &Fingerprint) -> &RwLock<()> {
        &self.stripes[fingerprint.0[0] as usize % LOCK_STRIPES]
    }

    fn lock_all(&self) -> Vec<RwLockWriteGuard<'_, ()>> {
        self.stripes.iter().map(|stripe| stripe.write()).collect()
    }

    /// Picks up changes made to the file from outside and drops L1 if the
    /// log has been rebuilt or cleared since L1 was filled.
    fn sync_l1(&self) -> CacheResult<()> {
        self.log.reload_if_changed()?;
        if self.l1_generation.load(Ordering::Acquire) == self.log.generation() {
            return Ok(());
        }

        let _all = self.lock_all();
        let generation = self.log.generation();
        self.l1.clear();
        self.l1_generation.store(generation, Ordering::Release);
        debug!(generation, "L1 dropped after log rebuild");
        Ok(())
    }

    /// Shared form for callers that keep the value around.
    pub fn get_shared(&self, fingerprint: &Fingerprint) -> CacheResult<Option<Arc<ResultSet>>> {
        self.sync_l1()?;
        if let Some(hit) = self.l1.get(fingerprint) {
            debug!(fingerprint = %fingerprint, "L1 hit");
            return Ok(Some(hit));
        }

        let _stripe = self.stripe(fingerprint).read();
        let Some(bytes) = self.log.get(fingerprint)? else {
            return Ok(None);
        };

        let results =
            ResultSet::from_json_bytes(&bytes).map_err(|e| CacheError::Corrupted {
                fingerprint: fingerprint.to_hex(),
                reason: format!("stored value is not a result set: {e}"),
            })?;
        let results = Arc::new(results);
        self.l1.insert(*fingerprint, Arc::clone(&results));
        Ok(Some(results))
    }
}

impl ResultStore for ResultCache {
    #[instrument(level = "debug", skip(self), fields(fingerprint = %fingerprint))]
    fn get(&self, fingerprint: &Fingerprint) -> CacheResult<Option<ResultSet>> {
        Ok(self
            .get_shared(fingerprint)?
            .map(Arc::unwrap_or_clone))
    }

    #[instrument(level = "debug", skip(self, results), fields(fingerprint = %fingerprint, hits = results.len()))]
    fn set(&self, fingerprint: Fingerprint, results: &ResultSet) -> CacheResult<()> {
        let bytes = results
            .to_json_bytes()
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        self.sync_l1()?;
        let _stripe = self.stripe(&fingerprint).write();
        self.log.set(fingerprint, bytes)?;
        self.l1.insert(fingerprint, Arc::new(results.clone()));
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        let _all = self.lock_all();
        let cleared = self.log.clear();
        self.l1.clear();
        self.l1_generation
            .store(self.log.generation(), Ordering::Release);
        cleared
    }

    fn len(&self) -> usize {
        self.log.len()
    }
}

impl<S: ResultStore> ResultStore for Arc<S> {
    fn get(&self, fingerprint: &Fingerprint) -> CacheResult<Option<ResultSet>> {
        (**self).get(fingerprint)
    }

    fn set(&self, fingerprint: Fingerprint, results: &ResultSet) -> CacheResult<()> {
        (**self).set(fingerprint, results)
    }

    fn clear(&self) -> CacheResult<()> {
        (**self).clear()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
