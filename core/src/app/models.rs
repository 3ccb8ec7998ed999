use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ragcore_embedders::OpenAiClient;

use crate::{
    core::{
        completion::{Completion, CompletionResponse},
        embedder::Embedder,
        settings::Configuration,
    },
    error::RagError,
    map_err,
};

/// [`Embedder`] over an OpenAI-compatible HTTP API. Reads `base_url`,
/// `api_key` and `embedding_model` from [`Configuration`] on every call
/// rather than caching them at construction, so a `reload()` takes effect
/// on the next request without restarting the process. `request_timeout`
/// bounds each underlying HTTP call.
pub struct OpenAiEmbedder {
    configuration: Arc<dyn Configuration>,
    request_timeout: Duration,
}

impl OpenAiEmbedder {
    pub fn new(configuration: Arc<dyn Configuration>, request_timeout: Duration) -> Self {
        Self { configuration, request_timeout }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        crate::DEFAULT_EMBEDDING_DIM
    }

    async fn embed_raw_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let settings = self.configuration.get_ai_settings().await?;
        let client = OpenAiClient::new(settings.base_url, settings.api_key, self.request_timeout);
        Ok(map_err!(client.embed(&settings.embedding_model, texts).await))
    }
}

/// [`Completion`] over the same API, dispatching `complete_small` to
/// `completion_small_model` and `complete_large` to `completion_large_model`.
/// Settings are read fresh per call for the same reason as above.
pub struct OpenAiCompletion {
    configuration: Arc<dyn Configuration>,
    request_timeout: Duration,
}

impl OpenAiCompletion {
    pub fn new(configuration: Arc<dyn Configuration>, request_timeout: Duration) -> Self {
        Self { configuration, request_timeout }
    }
}

#[async_trait]
impl Completion for OpenAiCompletion {
    async fn complete_small(&self, prompt: &str) -> Result<CompletionResponse, RagError> {
        let settings = self.configuration.get_ai_settings().await?;
        let client = OpenAiClient::new(settings.base_url, settings.api_key, self.request_timeout);
        let (text, tokens_used) = map_err!(
            client
                .complete(&settings.completion_small_model, &settings.system_prompt, prompt)
                .await
        );
        Ok(CompletionResponse { text, tokens_used })
    }

    async fn complete_large(&self, prompt: &str) -> Result<CompletionResponse, RagError> {
        let settings = self.configuration.get_ai_settings().await?;
        let client = OpenAiClient::new(settings.base_url, settings.api_key, self.request_timeout);
        let (text, tokens_used) = map_err!(
            client
                .complete(&settings.completion_large_model, &settings.system_prompt, prompt)
                .await
        );
        Ok(CompletionResponse { text, tokens_used })
    }
}
