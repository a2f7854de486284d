use std::path::PathBuf;

use thiserror::Error;

/// Result cache errors.
///
/// [`CacheError::Corrupted`] is a read-side problem the pipeline downgrades to a
/// miss; every other variant is a storage failure that is logged and skipped.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("cache write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("corrupted cache record for {fingerprint}: {reason}")]
    Corrupted { fingerprint: String, reason: String },
}

impl CacheError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, CacheError::Corrupted { .. })
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
