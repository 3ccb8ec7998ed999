use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Model/prompt configuration shared by QueryPipeline and ChatPipeline,
/// read from the `ai_settings` singleton row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub completion_small_model: String,
    pub completion_large_model: String,
    pub base_url: String,
    pub api_key: String,
    pub system_prompt: String,
    pub batch_size: usize,
    pub max_top_k: usize,
    pub default_top_k: usize,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: crate::DEFAULT_EMBEDDING_DIM,
            completion_small_model: "gpt-4o-mini".to_string(),
            completion_large_model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            system_prompt: "You are a helpful assistant that answers only from the provided context.".to_string(),
            batch_size: crate::DEFAULT_EMBED_BATCH_SIZE,
            max_top_k: 20,
            default_top_k: 5,
        }
    }
}

/// One row of `ListEnabledProviders()`: a provider pair with `enabled == true`
/// and its settings blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnabledProvider {
    pub provider_type: String,
    pub provider_name: String,
    pub settings: serde_json::Value,
}

/// Supplies current provider and AI settings to the three pipelines.
/// Reloadable without a process restart; in-flight requests keep whatever
/// they captured at entry.
#[async_trait]
pub trait Configuration: Send + Sync {
    /// Settings blob for `(provider_type, provider_name)`, validated on
    /// read. Returns `Ok(None)` (not an error) if the blob is missing or
    /// fails validation — the caller treats this as "skip the provider".
    async fn get_provider_settings(
        &self,
        provider_type: &str,
        provider_name: &str,
    ) -> Result<Option<serde_json::Value>, RagError>;

    async fn list_enabled_providers(&self) -> Result<Vec<EnabledProvider>, RagError>;

    async fn get_ai_settings(&self) -> Result<AiSettings, RagError>;

    /// Re-read the persistent settings tables. Takes effect on the next
    /// pipeline invocation.
    async fn reload(&self) -> Result<(), RagError>;

    /// Version stamp updated by `reload()`. Consumers that cache derived
    /// objects (model clients) compare this against their own version to
    /// decide whether to rebuild.
    fn loaded_at(&self) -> DateTime<Utc>;
}
