use thiserror::Error;

/// Failure of the live completion backend. Never leaves [`super::AnswerGenerator::generate`].
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend not configured")]
    NotConfigured,

    #[error("generation backend failed: {reason}")]
    Backend { reason: String },

    #[error("generation backend returned an empty completion")]
    EmptyCompletion,
}
