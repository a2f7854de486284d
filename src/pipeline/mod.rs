//! Two-stage retrieval: vector recall, one batched re-rank, truncation, with a
//! write-through result cache in front.

pub mod error;


pub use error::RetrievalError;

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStatus, ResultStore};
use crate::config::SearchConfig;
use crate::document::{Hit, ResultSet};
use crate::embedding::{RelevanceScorer, RerankerError};
use crate::hashing::{CanonicalRequest, Fingerprint};
use crate::vectordb::{Candidate, VectorIndex};

/// Orders `candidates` by `scores` descending and keeps the first `top_m`.
///
/// Exact ties keep the candidates' original order. Scores must be finite.
pub fn rank_candidates(candidates: Vec<Candidate>, scores: &[f32], top_m: usize) -> ResultSet {
    let mut ranked: Vec<(Candidate, f32)> = candidates
        .into_iter()
        .zip(scores.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(top_m);

    ranked
        .into_iter()
        .map(|(c, score)| Hit {
            doc_id: c.doc_id,
            text: c.text,
            score: f64::from(score),
            metadata: c.metadata,
        })
        .collect::<Vec<_>>()
        .into()
}

enum Outcome {
    Cached(ResultSet),
    Computed {
        fingerprint: Fingerprint,
        results: ResultSet,
    },
}

/// The retrieval core. Handles are created once and shared by every request.
pub struct RetrievalPipeline<I, R, C> {
    index: Arc<I>,
    scorer: Arc<R>,
    cache: Arc<C>,
    config: SearchConfig,
}

impl<I, R, C> Clone for RetrievalPipeline<I, R, C> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            scorer: Arc::clone(&self.scorer),
            cache: Arc::clone(&self.cache),
            config: self.config,
        }
    }
}

impl<I, R, C> RetrievalPipeline<I, R, C>
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    pub fn new(index: Arc<I>, scorer: Arc<R>, cache: Arc<C>, config: SearchConfig) -> Self {
        Self {
            index,
            scorer,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    pub fn scorer(&self) -> &Arc<R> {
        &self.scorer
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Searches with the configured `top_k`/`top_m`.
    pub async fn search_default(&self, query: &str) -> Result<ResultSet, RetrievalError> {
        self.search(query, self.config.top_k, self.config.top_m).await
    }

    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        top_m: usize,
    ) -> Result<ResultSet, RetrievalError> {
        self.search_with_status(query, top_k, top_m)
            .await
            .map(|(results, _)| results)
    }

    /// Like [`search`](Self::search), also reporting whether the cache served it.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn search_with_status(
        &self,
        query: &str,
        top_k: usize,
        top_m: usize,
    ) -> Result<(ResultSet, CacheStatus), RetrievalError> {
        validate_request(query, top_k, top_m)?;

        // The deadline covers lookup, recall and re-rank. The write-through
        // only starts once those finished in time, so a timed-out search
        // leaves the cache untouched and a slow write cannot time out a
        // finished search.
        let outcome = match self.config.request_timeout {
            Some(after) => tokio::time::timeout(after, self.run(query, top_k, top_m))
                .await
                .map_err(|_| {
                    warn!(timeout_ms = after.as_millis() as u64, "Search timed out");
                    RetrievalError::Timeout { after }
                })??,
            None => self.run(query, top_k, top_m).await?,
        };

        match outcome {
            Outcome::Cached(results) => Ok((results, CacheStatus::Hit)),
            Outcome::Computed {
                fingerprint,
                results,
            } => {
                self.cache_set(fingerprint, &results).await;
                Ok((results, CacheStatus::Miss))
            }
        }
    }

    async fn run(&self, query: &str, top_k: usize, top_m: usize) -> Result<Outcome, RetrievalError> {
        let fingerprint = CanonicalRequest::search(query, top_k, top_m).fingerprint();

        if let Some(results) = self.cache_get(fingerprint).await {
            info!(fingerprint = %fingerprint, hits = results.len(), "Cache hit");
            return Ok(Outcome::Cached(results));
        }
        info!(fingerprint = %fingerprint, "Cache miss");

        let candidates = self.index.query_nearest(query, top_k).await?;
        debug!(candidates = candidates.len(), "Recall complete");

        let results = if candidates.is_empty() {
            ResultSet::empty()
        } else {
            self.rerank(query, candidates, top_m).await?
        };

        Ok(Outcome::Computed {
            fingerprint,
            results,
        })
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_m: usize,
    ) -> Result<ResultSet, RetrievalError> {
        let scorer = Arc::clone(&self.scorer);
        let query = query.to_string();
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();

        let scores = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            scorer.score_batch(&query, &refs)
        })
        .await
        .map_err(|e| RetrievalError::RerankFailure {
            reason: format!("scoring task failed: {e}"),
        })??;

        if scores.len() != candidates.len() {
            return Err(RerankerError::ScoreCountMismatch {
                expected: candidates.len(),
                actual: scores.len(),
            }
            .into());
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(RetrievalError::RerankFailure {
                reason: format!("non-finite relevance score {bad}"),
            });
        }

        let results = rank_candidates(candidates, &scores, top_m);
        debug!(kept = results.len(), "Re-rank complete");
        Ok(results)
    }

    /// Any cache problem is a miss; corrupted entries get overwritten by the
    /// recomputed result.
    async fn cache_get(&self, fingerprint: Fingerprint) -> Option<ResultSet> {
        let cache = Arc::clone(&self.cache);
        let lookup = tokio::task::spawn_blocking(move || cache.get(&fingerprint)).await;

        match lookup {
            Ok(Ok(found)) => found,
            Ok(Err(e)) if e.is_corruption() => {
                warn!(fingerprint = %fingerprint, error = %e, "Corrupted cache entry, recomputing");
                None
            }
            Ok(Err(e)) => {
                warn!(fingerprint = %fingerprint, error = %e, "Cache read failed, recomputing");
                None
            }
            Err(e) => {
                warn!(error = %e, "Cache read task failed");
                None
            }
        }
    }

    async fn cache_set(&self, fingerprint: Fingerprint, results: &ResultSet) {
        let cache = Arc::clone(&self.cache);
        let results = results.clone();
        let write = tokio::task::spawn_blocking(move || cache.set(fingerprint, &results)).await;

        match write {
            Ok(Ok(())) => debug!(fingerprint = %fingerprint, "Result cached"),
            Ok(Err(e)) => warn!(fingerprint = %fingerprint, error = %e, "Cache write failed"),
            Err(e) => warn!(error = %e, "Cache write task failed"),
        }
    }
}

fn validate_request(query: &str, top_k: usize, top_m: usize) -> Result<(), RetrievalError> {
    if query.trim().is_empty() {
        return Err(RetrievalError::invalid("query must not be empty"));
    }
    if top_k == 0 {
        return Err(RetrievalError::invalid("top_k must be greater than zero"));
    }
    if top_m == 0 || top_m > top_k {
        return Err(RetrievalError::invalid(format!(
            "top_m must satisfy 0 < top_m <= top_k (got top_m={top_m}, top_k={top_k})"
        )));
    }
    Ok(())
}
