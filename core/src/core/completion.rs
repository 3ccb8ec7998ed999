use async_trait::async_trait;

use crate::error::RagError;

/// Result of one completion-model call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub tokens_used: u32,
}

/// Abstracts the chat/completion model used by [`crate::core::service::query`]
/// and [`crate::core::service::chat`]. Two tiers are exposed because the
/// chat pipeline deliberately uses a cheap model for refinement/evaluation
/// and a stronger one for final answer synthesis.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Used for query refinement, rephrasing, and answerability evaluation.
    async fn complete_small(&self, prompt: &str) -> Result<CompletionResponse, RagError>;

    /// Used for final answer synthesis in both QueryPipeline and ChatPipeline.
    async fn complete_large(&self, prompt: &str) -> Result<CompletionResponse, RagError>;
}
