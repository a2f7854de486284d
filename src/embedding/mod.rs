//! Embedding + model utilities.
//!
//! - [`encoder`] turns queries and documents into vectors for recall.
//! - [`reranker`] scores `(query, candidate)` pairs for the second stage.

/// BERT backbones (bi-encoder and cross-encoder) plus batch tensor helpers.
pub mod bert;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
/// Sentence embedder (mean-pooled BERT or hashed stub).
pub mod encoder;
mod error;
/// Cross-encoder reranker.
pub mod reranker;
/// Tokenizer loading helpers.
pub mod utils;

pub use encoder::{ENCODER_EMBEDDING_DIM, EncoderConfig, SentenceEmbedder};
pub use error::EmbeddingError;
pub use reranker::{RelevanceScorer, Reranker, RerankerConfig, RerankerError};
#[cfg(any(test, feature = "mock"))]
pub use reranker::MockScorer;
