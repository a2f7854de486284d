//! Fathom library crate (used by the `fathom` binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Retrieval core
//! - [`RetrievalPipeline`], [`RetrievalError`] - recall, batched re-rank, truncation
//! - [`ResultCache`], [`ResultStore`], [`ResultLog`] - durable content-addressed result cache
//! - [`Fingerprint`], [`CanonicalRequest`] - cache keys
//!
//! ## Collaborators
//! - [`VectorIndex`], [`QdrantIndex`] - nearest-neighbour recall
//! - [`RelevanceScorer`], [`Reranker`] - cross-encoder scoring
//! - [`AnswerGenerator`] - answer text with an extractive fallback
//! - [`build_index`] - batched index build from a JSONL document file
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod document;
pub mod embedding;
pub mod gateway;
pub mod generate;
pub mod hashing;
pub mod indexer;
pub mod pipeline;
pub mod vectordb;

pub use cache::{
    CACHE_STATUS_HEADER, CacheError, CacheStatus, CompactionReport, L1Cache, ResultCache,
    ResultLog, ResultStore,
};
#[cfg(any(test, feature = "mock"))]
pub use cache::MockResultStore;

pub use config::{Config, ConfigError, SearchConfig};
pub use constants::{DEFAULT_TOP_K, DEFAULT_TOP_M};
pub use document::{Document, Hit, ProductRecord, ResultSet, normalize_text, read_documents};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockScorer;
pub use embedding::{
    EmbeddingError, EncoderConfig, RelevanceScorer, Reranker, RerankerConfig, RerankerError,
    SentenceEmbedder,
};
pub use generate::{AnswerGenerator, CompletionBackend, GenerationError, extractive_fallback};
pub use hashing::{CanonicalRequest, Fingerprint, fingerprint, hash_to_u64};
pub use indexer::{IndexBuildError, IndexReport, build_index};
pub use pipeline::{RetrievalError, RetrievalPipeline, rank_candidates};
#[cfg(any(test, feature = "mock"))]
pub use vectordb::MockVectorIndex;
pub use vectordb::{Candidate, IndexWriter, QdrantClient, QdrantIndex, VectorDbError, VectorIndex};
