use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::index::{IndexWriter, VectorIndex};
use super::model::Candidate;
use super::VectorDbError;
use crate::document::Document;

const MOCK_COLLECTION: &str = "mock";

/// In-memory index ranking by shared lowercase terms, ties by insertion order.
///
/// Counts calls and can be told to fail or stall, for pipeline tests.
#[derive(Default)]
pub struct MockVectorIndex {
    docs: RwLock<Vec<Document>>,
    queries: AtomicUsize,
    fail: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let index = Self::new();
        for doc in docs {
            index.insert(doc);
        }
        index
    }

    /// Upsert: an existing id keeps its position and takes the new content.
    pub fn insert(&self, doc: Document) {
        let mut docs = self.docs.write();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Number of `query_nearest` calls so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    fn rank(&self, text: &str, k: usize) -> Vec<Candidate> {
        let query = terms(text);
        let docs = self.docs.read();

        let mut scored: Vec<(usize, &Document)> = docs
            .iter()
            .map(|d| (terms(&d.text).intersection(&query).count(), d))
            .collect();
        // Stable: equal overlap keeps insertion order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(k)
            .map(|(overlap, d)| Candidate::from_document(d, overlap as f32))
            .collect()
    }
}

impl VectorIndex for MockVectorIndex {
    async fn query_nearest(&self, text: &str, k: usize) -> Result<Vec<Candidate>, VectorDbError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(VectorDbError::SearchFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "injected failure".to_string(),
            });
        }

        Ok(self.rank(text, k))
    }

    async fn ready(&self) -> bool {
        !self.fail.load(Ordering::SeqCst)
    }
}

impl IndexWriter for MockVectorIndex {
    async fn upsert_documents(&self, docs: Vec<Document>) -> Result<usize, VectorDbError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VectorDbError::UpsertFailed {
                collection: MOCK_COLLECTION.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let n = docs.len();
        for doc in docs {
            self.insert(doc);
        }
        Ok(n)
    }

    async fn reset(&self) -> Result<(), VectorDbError> {
        self.docs.write().clear();
        Ok(())
    }
}
