use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use tracing::debug;

use super::error::GenerationError;

pub const SYSTEM_PROMPT: &str = "You are a concise, precise product search explainer.";
pub const GENERATION_TEMPERATURE: f64 = 0.2;

/// Builds the user prompt: instructions, the query, then one bullet per context.
pub fn build_prompt(query: &str, contexts: &[String]) -> String {
    let bullets: Vec<String> = contexts.iter().map(|c| format!("- {c}")).collect();
    format!(
        "You are a helpful fashion search assistant.\n\
         Use ONLY the given product snippets to answer the user's query precisely.\n\
         If relevant, name product titles/brands and explain why they match. Be concise.\n\
         \n\
         Query: {query}\n\
         \n\
         Context:\n\
         {}\n",
        bullets.join("\n")
    )
}

/// Text-completion service behind the answer generator.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;

    fn name(&self) -> &str;
}

/// Chat completion through `genai`; credentials come from the provider's
/// standard environment variable.
#[derive(Clone)]
pub struct GenaiBackend {
    client: Client,
    model: String,
    temperature: f64,
}

impl GenaiBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
            temperature: GENERATION_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for GenaiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiBackend")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[async_trait]
impl CompletionBackend for GenaiBackend {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(prompt)]);
        let options = ChatOptions::default().with_temperature(self.temperature);

        let response = self
            .client
            .exec_chat(&self.model, request, Some(&options))
            .await
            .map_err(|e| GenerationError::Backend {
                reason: e.to_string(),
            })?;

        let text = response.first_text().unwrap_or_default().trim().to_string();
        debug!(model = %self.model, chars = text.len(), "Completion received");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
