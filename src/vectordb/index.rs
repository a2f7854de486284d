use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::client::QdrantClient;
use super::error::VectorDbError;
use super::model::{Candidate, document_point};
use crate::document::Document;
use crate::embedding::SentenceEmbedder;

/// First retrieval stage: nearest documents for a query string.
///
/// For a fixed index state the same `(text, k)` must return the same candidates
/// in the same order.
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` candidates, best first. Fewer than `k` is not an error.
    fn query_nearest(
        &self,
        text: &str,
        k: usize,
    ) -> impl Future<Output = Result<Vec<Candidate>, VectorDbError>> + Send;

    /// `true` when the backend is reachable and the collection exists.
    fn ready(&self) -> impl Future<Output = bool> + Send;
}

/// Write side used by the index build.
pub trait IndexWriter: Send + Sync {
    /// Inserts or replaces documents by id; returns the number written.
    fn upsert_documents(
        &self,
        docs: Vec<Document>,
    ) -> impl Future<Output = Result<usize, VectorDbError>> + Send;

    /// Drops every indexed document.
    fn reset(&self) -> impl Future<Output = Result<(), VectorDbError>> + Send;
}

/// Qdrant collection searched with sentence-embedder vectors.
#[derive(Clone)]
pub struct QdrantIndex {
    client: QdrantClient,
    embedder: Arc<SentenceEmbedder>,
    collection: String,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("url", &self.client.url())
            .field("collection", &self.collection)
            .field("embedder", &self.embedder)
            .finish()
    }
}

impl QdrantIndex {
    pub fn new(client: QdrantClient, embedder: Arc<SentenceEmbedder>, collection: &str) -> Self {
        Self {
            client,
            embedder,
            collection: collection.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &Arc<SentenceEmbedder> {
        &self.embedder
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, VectorDbError> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder.embed_batch(&refs)
        })
        .await
        .map_err(|e| VectorDbError::EmbeddingFailed {
            reason: format!("embedding task failed: {e}"),
        })?
        .map_err(VectorDbError::from)
    }
}

impl VectorIndex for QdrantIndex {
    #[instrument(skip(self, text), fields(text_len = text.len(), collection = %self.collection))]
    async fn query_nearest(&self, text: &str, k: usize) -> Result<Vec<Candidate>, VectorDbError> {
        let mut vectors = self.embed(vec![text.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| VectorDbError::EmbeddingFailed {
            reason: "embedder returned no vector".to_string(),
        })?;

        let points = self.client.search(&self.collection, vector, k as u64).await?;
        let total = points.len();
        let candidates: Vec<Candidate> = points
            .into_iter()
            .filter_map(Candidate::from_scored_point)
            .collect();

        if candidates.len() != total {
            warn!(
                skipped = total - candidates.len(),
                "Ignoring points without a doc_id payload"
            );
        }
        debug!(candidates = candidates.len(), "Vector recall complete");

        Ok(candidates)
    }

    async fn ready(&self) -> bool {
        self.client.health_check().await.is_ok()
            && self
                .client
                .collection_exists(&self.collection)
                .await
                .unwrap_or(false)
    }
}

impl IndexWriter for QdrantIndex {
    #[instrument(skip(self, docs), fields(docs = docs.len()))]
    async fn upsert_documents(&self, docs: Vec<Document>) -> Result<usize, VectorDbError> {
        if docs.is_empty() {
            return Ok(0);
        }

        let texts = docs.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed(texts).await?;

        let dim = self.embedder.embedding_dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(VectorDbError::InvalidDimension {
                expected: dim,
                actual: bad.len(),
            });
        }

        self.client
            .ensure_collection(&self.collection, dim as u64)
            .await?;

        let points = docs
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| document_point(doc, vector))
            .collect();
        self.client.upsert_points(&self.collection, points).await?;

        Ok(docs.len())
    }

    async fn reset(&self) -> Result<(), VectorDbError> {
        self.client.delete_collection(&self.collection).await
    }
}
