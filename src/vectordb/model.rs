use std::collections::HashMap;

use qdrant_client::qdrant::{PointStruct, ScoredPoint, Value};

use crate::document::{Document, Metadata};
use crate::hashing::hash_to_u64;

pub const PAYLOAD_DOC_ID: &str = "doc_id";
pub const PAYLOAD_TEXT: &str = "text";
pub const PAYLOAD_METADATA: &str = "metadata";

/// A document returned by the first (vector recall) stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub doc_id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Backend similarity; informational only, never used for final ranking.
    pub similarity: f32,
}

impl Candidate {
    pub fn from_document(doc: &Document, similarity: f32) -> Self {
        Self {
            doc_id: doc.id.clone(),
            text: doc.text.clone(),
            metadata: doc.metadata.clone(),
            similarity,
        }
    }

    /// Returns `None` for points that were not written by this crate.
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let payload = point.payload;

        let doc_id = payload.get(PAYLOAD_DOC_ID)?.as_str()?.clone();
        let text = payload
            .get(PAYLOAD_TEXT)
            .and_then(|v| v.as_str())
            .cloned()
            .unwrap_or_default();
        let metadata = payload
            .get(PAYLOAD_METADATA)
            .and_then(|v| v.as_str())
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        Some(Self {
            doc_id,
            text,
            metadata,
            similarity: point.score,
        })
    }
}

/// Stable Qdrant point id for a document id. Re-adding a document overwrites its point.
#[inline]
pub fn point_id(doc_id: &str) -> u64 {
    hash_to_u64(doc_id.as_bytes())
}

/// Builds the point stored for `doc`. Metadata is kept as one JSON string.
pub fn document_point(doc: &Document, vector: Vec<f32>) -> PointStruct {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert(PAYLOAD_DOC_ID.to_string(), doc.id.clone().into());
    payload.insert(PAYLOAD_TEXT.to_string(), doc.text.clone().into());
    let metadata = serde_json::to_string(&doc.metadata).unwrap_or_else(|_| "{}".to_string());
    payload.insert(PAYLOAD_METADATA.to_string(), metadata.into());

    PointStruct::new(point_id(&doc.id), vector, payload)
}
