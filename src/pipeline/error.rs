use std::time::Duration;

use thiserror::Error;

use crate::embedding::RerankerError;
use crate::vectordb::VectorDbError;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("vector index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    #[error("re-ranking failed: {reason}")]
    RerankFailure { reason: String },

    #[error("invalid search request: {reason}")]
    InvalidRequest { reason: String },

    #[error("search timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },
}

impl RetrievalError {
    /// Index or re-ranker failure, as opposed to a caller error or timeout.
    pub fn is_retrieval_unavailable(&self) -> bool {
        matches!(
            self,
            RetrievalError::IndexUnavailable { .. } | RetrievalError::RerankFailure { .. }
        )
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        RetrievalError::InvalidRequest {
            reason: reason.into(),
        }
    }
}

impl From<VectorDbError> for RetrievalError {
    fn from(err: VectorDbError) -> Self {
        RetrievalError::IndexUnavailable {
            reason: err.to_string(),
        }
    }
}

impl From<RerankerError> for RetrievalError {
    fn from(err: RerankerError) -> Self {
        RetrievalError::RerankFailure {
            reason: err.to_string(),
        }
    }
}
