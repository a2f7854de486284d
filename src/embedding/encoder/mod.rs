//! Sentence embedder used for vector recall.
//!
//! Loads a BERT bi-encoder with mean pooling, or runs a deterministic hashed
//! bag-of-words stub when no model directory is configured.

pub mod config;


pub use config::{ENCODER_EMBEDDING_DIM, ENCODER_MAX_SEQ_LEN, EncoderConfig};

use candle_core::Device;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::embedding::bert::{BatchInputs, BertEncoder};
use crate::embedding::device::select_device;
use crate::embedding::error::EmbeddingError;
use crate::embedding::utils::load_batch_tokenizer;
use crate::hashing::hash_to_u64;

enum EncoderBackend {
    Model {
        model: BertEncoder,
        tokenizer: Tokenizer,
        device: Device,
    },
    Stub,
}

pub struct SentenceEmbedder {
    backend: EncoderBackend,
    config: EncoderConfig,
}

impl std::fmt::Debug for SentenceEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEmbedder")
            .field(
                "backend",
                &match &self.backend {
                    EncoderBackend::Model { device, .. } => format!("Model({device:?})"),
                    EncoderBackend::Stub => "Stub".to_string(),
                },
            )
            .field("embedding_dim", &self.embedding_dim())
            .finish()
    }
}

impl SentenceEmbedder {
    pub fn load(config: EncoderConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let Some(model_path) = config.model_path.clone() else {
            warn!("No embedder model configured, using hashed bag-of-words stub");
            return Ok(Self {
                backend: EncoderBackend::Stub,
                config,
            });
        };

        for required in ["config.json", "model.safetensors", "tokenizer.json"] {
            if !model_path.join(required).exists() {
                return Err(EmbeddingError::ModelNotFound {
                    path: model_path.join(required),
                });
            }
        }

        let device = select_device()?;
        debug!(?device, "Selected compute device for embedder");

        let model = BertEncoder::load(&model_path, &device).map_err(|e| {
            EmbeddingError::ModelLoadFailed {
                reason: format!("failed to load BERT encoder: {e}"),
            }
        })?;
        let tokenizer = load_batch_tokenizer(&model_path, config.max_seq_len).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: format!("failed to load tokenizer: {e}"),
            }
        })?;

        info!(
            model_path = %model_path.display(),
            hidden_size = model.hidden_size(),
            "Sentence embedder loaded"
        );

        Ok(Self {
            backend: EncoderBackend::Model {
                model,
                tokenizer,
                device,
            },
            config,
        })
    }

    pub fn stub() -> Self {
        Self {
            backend: EncoderBackend::Stub,
            config: EncoderConfig::stub(),
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors.pop().ok_or_else(|| EmbeddingError::InferenceFailed {
            reason: "encoder returned no vector".to_string(),
        })
    }

    /// Embeds texts in chunks of `batch_size`, one forward pass per chunk.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match &self.backend {
            EncoderBackend::Model {
                model,
                tokenizer,
                device,
            } => {
                let mut out = Vec::with_capacity(texts.len());
                for chunk in texts.chunks(self.config.batch_size) {
                    out.extend(Self::forward_chunk(model, tokenizer, device, chunk)?);
                }
                Ok(out)
            }
            EncoderBackend::Stub => Ok(texts
                .iter()
                .map(|t| hashed_bag_of_words(t, self.config.embedding_dim))
                .collect()),
        }
    }

    fn forward_chunk(
        model: &BertEncoder,
        tokenizer: &Tokenizer,
        device: &Device,
        texts: &[&str],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = tokenizer.encode_batch(texts.to_vec(), true).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            }
        })?;

        debug!(
            batch = texts.len(),
            seq_len = encodings.first().map(|e| e.len()).unwrap_or(0),
            "Embedding batch"
        );

        let inputs = BatchInputs::from_encodings(&encodings, device)?;
        let pooled = model.forward(&inputs)?;
        Ok(pooled.to_vec2::<f32>()?)
    }

    pub fn embedding_dim(&self) -> usize {
        match &self.backend {
            EncoderBackend::Model { model, .. } => model.hidden_size(),
            EncoderBackend::Stub => self.config.embedding_dim,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.backend, EncoderBackend::Stub)
    }
}

/// Signed feature hashing of lowercase alphanumeric tokens, L2-normalized.
///
/// Texts sharing words get positive cosine similarity, which keeps stub-mode
/// recall meaningful without model files.
pub fn hashed_bag_of_words(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0f32; dim];
    let lower = text.to_lowercase();

    for token in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let h = hash_to_u64(token.as_bytes());
        let idx = (h % dim as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        v[idx] += sign;
    }

    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    } else {
        // Cosine is undefined for the zero vector.
        v[0] = 1.0;
    }
    v
}
