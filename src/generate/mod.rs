//! Answer generation over retrieved contexts.
//!
//! [`AnswerGenerator::generate`] always returns text: without a configured
//! backend, or when the backend fails, it answers with
//! [`extractive_fallback`].

pub mod backend;
pub mod error;
pub mod extractive;


pub use backend::{CompletionBackend, GenaiBackend, SYSTEM_PROMPT, build_prompt};
pub use error::GenerationError;
pub use extractive::{EXTRACTIVE_HEADER, extractive_fallback};

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::constants::GENERATION_CREDENTIAL_ENV;

#[derive(Clone, Default)]
pub struct AnswerGenerator {
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl std::fmt::Debug for AnswerGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerGenerator")
            .field("mode", &self.mode())
            .finish()
    }
}

impl AnswerGenerator {
    /// Extractive answers only.
    pub fn extractive() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Live backend when the generation credential is set and non-blank,
    /// extractive mode otherwise.
    pub fn from_env(model: &str) -> Self {
        let has_credential = std::env::var(GENERATION_CREDENTIAL_ENV)
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);

        if has_credential {
            debug!(model, "Generation backend enabled");
            Self::with_backend(Arc::new(GenaiBackend::new(model)))
        } else {
            debug!("No generation credential, using extractive answers");
            Self::extractive()
        }
    }

    pub fn is_live(&self) -> bool {
        self.backend.is_some()
    }

    pub fn mode(&self) -> &'static str {
        if self.is_live() { "live" } else { "extractive" }
    }

    /// Backend answer, or the reason there is none.
    pub async fn try_generate(
        &self,
        query: &str,
        contexts: &[String],
    ) -> Result<String, GenerationError> {
        let backend = self.backend.as_ref().ok_or(GenerationError::NotConfigured)?;
        let prompt = build_prompt(query, contexts);

        let text = backend.complete(SYSTEM_PROMPT, &prompt).await?;
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(text)
    }

    /// Never fails.
    #[instrument(skip(self, query, contexts), fields(contexts = contexts.len(), mode = self.mode()))]
    pub async fn generate(&self, query: &str, contexts: &[String]) -> String {
        match self.try_generate(query, contexts).await {
            Ok(text) => text,
            Err(GenerationError::NotConfigured) => extractive_fallback(query, contexts),
            Err(e) => {
                warn!(error = %e, "Generation failed, falling back to extractive answer");
                extractive_fallback(query, contexts)
            }
        }
    }
}
