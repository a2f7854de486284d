use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{RelevanceScorer, RerankerError};

/// Scores each text by the number of lowercase terms it shares with the query.
///
/// Records every batch it sees and can be told to fail or to return the wrong
/// number of scores.
#[derive(Debug, Default)]
pub struct MockScorer {
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    fail: AtomicBool,
    drop_last_score: AtomicBool,
}

fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn overlap_count(query: &str, text: &str) -> f32 {
    terms(query).intersection(&terms(text)).count() as f32
}

impl MockScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_drop_last_score(&self, drop: bool) {
        self.drop_last_score.store(drop, Ordering::SeqCst);
    }
}

impl RelevanceScorer for MockScorer {
    fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(texts.len());

        if self.fail.load(Ordering::SeqCst) {
            return Err(RerankerError::InferenceFailed {
                reason: "injected scorer failure".to_string(),
            });
        }

        let mut scores: Vec<f32> = texts.iter().map(|t| overlap_count(query, t)).collect();
        if self.drop_last_score.load(Ordering::SeqCst) {
            scores.pop();
        }
        Ok(scores)
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}
