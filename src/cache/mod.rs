//! Content-addressed result cache: an append-only durable log with an
//! in-process L1 in front.

pub mod error;
pub mod l1;
pub mod log;
pub mod record;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use error::{CacheError, CacheResult};
pub use l1::L1Cache;
pub use log::{CompactionReport, ResultLog};
pub use record::CacheRecord;
pub use store::{DEFAULT_L1_CAPACITY, ResultCache, ResultStore};
pub use types::{CACHE_STATUS_HEADER, CacheStatus};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockResultStore;
