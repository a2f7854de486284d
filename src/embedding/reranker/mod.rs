//! Cross-encoder re-ranking.
//!
//! [`Reranker::score_batch`] scores every `(query, candidate)` pair of a request
//! in one padded forward pass. Without a model directory it falls back to a
//! lexical-overlap score that is monotone in shared terms.

pub mod config;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use config::{MAX_SEQ_LEN, RerankerConfig};
pub use error::RerankerError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockScorer;

use std::collections::HashSet;

use candle_core::Device;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::embedding::bert::{BatchInputs, BertClassifier};
use crate::embedding::device::select_device;
use crate::embedding::utils::load_batch_tokenizer;

/// Scores candidate texts against a query, one score per text, same order.
///
/// Implementations are shared across requests and must be safe for concurrent use.
pub trait RelevanceScorer: Send + Sync {
    fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankerError>;

    /// Short label for readiness reporting.
    fn mode(&self) -> &'static str {
        "model"
    }
}

pub struct Reranker {
    device: Device,
    config: RerankerConfig,
    model: Option<BertClassifier>,
    tokenizer: Option<Tokenizer>,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .field("model_loaded", &self.is_model_loaded())
            .finish()
    }
}

impl Reranker {
    pub fn load(config: RerankerConfig) -> Result<Self, RerankerError> {
        if let Err(msg) = config.validate() {
            return Err(RerankerError::InvalidConfig { reason: msg });
        }

        let device = select_device()?;
        debug!(?device, "Selected compute device for reranker");

        let Some(ref model_path) = config.model_path else {
            info!("No reranker model path configured, operating in stub mode");
            return Ok(Self {
                device,
                config,
                model: None,
                tokenizer: None,
            });
        };

        if !model_path.exists() {
            return Err(RerankerError::ModelNotFound {
                path: model_path.clone(),
            });
        }
        for required in ["config.json", "model.safetensors"] {
            if !model_path.join(required).exists() {
                return Err(RerankerError::ModelLoadFailed {
                    reason: format!("missing {required} in {}", model_path.display()),
                });
            }
        }

        info!(model_path = %model_path.display(), "Loading cross-encoder");

        let model =
            BertClassifier::load(model_path, &device).map_err(|e| RerankerError::ModelLoadFailed {
                reason: format!("failed to load BERT model: {e}"),
            })?;

        let tokenizer = load_batch_tokenizer(model_path, config.max_seq_len).map_err(|e| {
            RerankerError::ModelLoadFailed {
                reason: format!("failed to load tokenizer: {e}"),
            }
        })?;

        info!(max_seq_len = config.max_seq_len, "Cross-encoder loaded");

        Ok(Self {
            device,
            config,
            model: Some(model),
            tokenizer: Some(tokenizer),
        })
    }

    pub fn stub() -> Result<Self, RerankerError> {
        Self::load(RerankerConfig::stub())
    }

    /// One score per candidate, in input order.
    pub fn score_batch(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>, RerankerError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            query_len = query.len(),
            num_candidates = candidates.len(),
            model_loaded = self.is_model_loaded(),
            "Scoring candidate batch"
        );

        let scores = match (&self.model, &self.tokenizer) {
            (Some(model), Some(tokenizer)) => self.forward_batch(model, tokenizer, query, candidates)?,
            _ => candidates
                .iter()
                .map(|c| lexical_overlap_score(query, c))
                .collect(),
        };

        if scores.len() != candidates.len() {
            return Err(RerankerError::ScoreCountMismatch {
                expected: candidates.len(),
                actual: scores.len(),
            });
        }

        debug!(
            top_score = scores.iter().copied().reduce(f32::max),
            "Batch scored"
        );

        Ok(scores)
    }

    fn forward_batch(
        &self,
        model: &BertClassifier,
        tokenizer: &Tokenizer,
        query: &str,
        candidates: &[&str],
    ) -> Result<Vec<f32>, RerankerError> {
        let pairs: Vec<(&str, &str)> = candidates.iter().map(|c| (query, *c)).collect();
        let encodings =
            tokenizer
                .encode_batch(pairs, true)
                .map_err(|e| RerankerError::TokenizationFailed {
                    reason: e.to_string(),
                })?;

        let inputs = BatchInputs::from_encodings(&encodings, &self.device)?;
        let logits = model
            .forward(&inputs)
            .map_err(|e| RerankerError::InferenceFailed {
                reason: e.to_string(),
            })?;

        Ok(logits.flatten_all()?.to_vec1::<f32>()?)
    }

    pub fn score(&self, query: &str, candidate: &str) -> Result<f32, RerankerError> {
        let scores = self.score_batch(query, &[candidate])?;
        scores
            .first()
            .copied()
            .ok_or(RerankerError::ScoreCountMismatch {
                expected: 1,
                actual: 0,
            })
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl RelevanceScorer for Reranker {
    fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankerError> {
        Reranker::score_batch(self, query, texts)
    }

    fn mode(&self) -> &'static str {
        if self.is_model_loaded() { "model" } else { "stub" }
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "can", "to", "of", "in", "for", "on",
    "with", "at", "by", "from", "as", "into", "under", "over", "and", "but", "or", "if", "so",
    "than", "too", "very", "just", "what", "which", "who", "this", "that", "these", "those",
    "it", "its", "me", "my", "i", "some", "any",
];

fn content_terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Stub relevance in `[0, 1]`: sigmoid over `0.6 * recall + 0.4 * jaccard`.
pub fn lexical_overlap_score(query: &str, candidate: &str) -> f32 {
    let query_terms = content_terms(query);
    let candidate_terms = content_terms(candidate);

    if query_terms.is_empty() {
        let len_ratio = (query.len().min(candidate.len()) as f32)
            / (query.len().max(candidate.len()).max(1) as f32);
        return len_ratio * 0.3;
    }

    let matches = query_terms.intersection(&candidate_terms).count();
    let recall = matches as f32 / query_terms.len() as f32;

    let union = query_terms.union(&candidate_terms).count();
    let jaccard = if union > 0 {
        matches as f32 / union as f32
    } else {
        0.0
    };

    let base_score = 0.6 * recall + 0.4 * jaccard;
    let normalized = 1.0 / (1.0 + (-8.0 * (base_score - 0.5)).exp());

    normalized.clamp(0.0, 1.0)
}
