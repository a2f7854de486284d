use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};

use super::error::VectorDbError;

#[derive(Clone)]
/// Thin Qdrant wrapper that maps every failure into [`VectorDbError`].
pub struct QdrantClient {
    client: Qdrant,
    url: String,
}

impl QdrantClient {
    /// Creates a client for `url` (no request is made yet).
    pub fn new(url: &str) -> Result<Self, VectorDbError> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| VectorDbError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool, VectorDbError> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })
    }

    /// Ensures a cosine-distance collection exists (creates it if missing).
    pub async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDbError> {
        if self.collection_exists(name).await? {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine))
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    pub async fn delete_collection(&self, name: &str) -> Result<(), VectorDbError> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }

        self.client
            .delete_collection(name)
            .await
            .map_err(|e| VectorDbError::DeleteFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Upserts and waits until the points are searchable.
    pub async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<PointStruct>,
    ) -> Result<(), VectorDbError> {
        if points.is_empty() {
            return Ok(());
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Nearest points by cosine similarity, payload included, backend order preserved.
    pub async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredPoint>, VectorDbError> {
        let response = self
            .client
            .search_points(SearchPointsBuilder::new(collection, query, limit).with_payload(true))
            .await
            .map_err(|e| search_error(collection, e.to_string()))?;

        Ok(response.result)
    }
}

/// Classifies a failed search; a missing collection gets its own variant so
/// callers can tell "not built yet" apart from a backend fault.
pub(crate) fn search_error(collection: &str, message: String) -> VectorDbError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("doesn't exist") || lowered.contains("not found") {
        VectorDbError::CollectionNotFound {
            collection: collection.to_string(),
        }
    } else {
        VectorDbError::SearchFailed {
            collection: collection.to_string(),
            message,
        }
    }
}
