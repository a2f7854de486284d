//! Cross-cutting, shared constants.

/// Candidates fetched from the vector index before re-ranking.
pub const DEFAULT_TOP_K: usize = 20;

/// Hits kept after re-ranking.
pub const DEFAULT_TOP_M: usize = 3;

/// Upper bound on documents per index upsert.
pub const INDEX_BATCH_SIZE: usize = 1024;

/// Default vector collection for catalogue documents.
pub const DEFAULT_COLLECTION_NAME: &str = "catalog_products";

/// Output size of the default sentence embedder (MiniLM-L6).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Max tokens fed to the embedder and the cross-encoder.
pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

/// File name of the durable result cache inside the data directory.
pub const DEFAULT_CACHE_FILE_NAME: &str = "search_cache.log";

/// Stage label mixed into every search fingerprint.
pub const SEARCH_STAGE: &str = "search";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// Environment variable whose presence switches on live answer generation.
pub const GENERATION_CREDENTIAL_ENV: &str = "OPENAI_API_KEY";

/// Sentences kept by the extractive fallback.
pub const EXTRACTIVE_MAX_SENTENCES: usize = 5;
