use std::path::PathBuf;

use thiserror::Error;

/// Errors reading a line-delimited document file.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("document at line {line} has an empty id")]
    EmptyId { line: usize },
}
