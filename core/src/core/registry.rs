use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    core::model::{ProviderPair, ProviderRegistryEntry},
    error::RagError,
};

/// Tracks per-provider-pair registration metadata in the `providers` table
/// — distinct from [`crate::core::store::ChunkStore`], which owns
/// the `docs_files`/`docs_chunks` tables.
#[async_trait]
pub trait ProviderRegistry: Send + Sync {
    /// Upsert the entry for `pair`: sets `registered_at` only if the row is
    /// new, always overwrites `metadata`.
    async fn register(&self, pair: &ProviderPair, metadata: serde_json::Value) -> Result<(), RagError>;

    async fn stamp_last_sync(&self, pair: &ProviderPair, at: DateTime<Utc>) -> Result<(), RagError>;

    async fn list(&self) -> Result<Vec<ProviderRegistryEntry>, RagError>;
}
