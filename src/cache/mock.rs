use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::error::{CacheError, CacheResult};
use super::store::ResultStore;
use crate::document::ResultSet;
use crate::hashing::Fingerprint;

/// In-memory [`ResultStore`] with failure injection.
#[derive(Debug, Default)]
pub struct MockResultStore {
    entries: Mutex<HashMap<Fingerprint, Vec<u8>>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_writes: AtomicBool,
    write_latency: Mutex<Option<Duration>>,
}

impl MockResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Blocks every `set` for `latency` before it takes effect.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        *self.write_latency.lock() = latency;
    }

    /// Overwrites the stored bytes for `fingerprint` with garbage.
    pub fn corrupt(&self, fingerprint: &Fingerprint) {
        self.entries
            .lock()
            .insert(*fingerprint, b"\x00not json".to_vec());
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.lock().contains_key(fingerprint)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl ResultStore for MockResultStore {
    fn get(&self, fingerprint: &Fingerprint) -> CacheResult<Option<ResultSet>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let Some(bytes) = self.entries.lock().get(fingerprint).cloned() else {
            return Ok(None);
        };

        ResultSet::from_json_bytes(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Corrupted {
                fingerprint: fingerprint.to_hex(),
                reason: e.to_string(),
            })
    }

    fn set(&self, fingerprint: Fingerprint, results: &ResultSet) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = *self.write_latency.lock() {
            std::thread::sleep(latency);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::WriteFailed {
                reason: "injected write failure".to_string(),
            });
        }

        let bytes = results
            .to_json_bytes()
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        self.entries.lock().insert(fingerprint, bytes);
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
