use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `(provider_type, provider_name)` key that scopes ownership of
/// documents and chunks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderPair {
    pub provider_type: String,
    pub provider_name: String,
}

impl ProviderPair {
    pub fn new(provider_type: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self { provider_type: provider_type.into(), provider_name: provider_name.into() }
    }
}

impl fmt::Display for ProviderPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_type, self.provider_name)
    }
}

/// One entry returned by [`crate::core::provider::Provider::enumerate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub document_id: String,
    pub filename: String,
    pub relative_path: Option<String>,
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub provider_type: String,
    pub provider_name: String,
}

impl DocumentDescriptor {
    pub fn pair(&self) -> ProviderPair {
        ProviderPair::new(self.provider_type.clone(), self.provider_name.clone())
    }
}

/// Per-provider-pair metadata persisted to the `providers` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderRegistryEntry {
    pub provider_type: String,
    pub provider_name: String,
    pub enabled: bool,
    pub registered_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// A contiguous text segment of a document, with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub filename: String,
    pub provider_type: String,
    pub provider_name: String,
    pub chunk_num: i32,
    pub text: String,
    pub char_start: i64,
    pub char_end: i64,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Restricts a [`crate::core::store::ChunkStore::search`] call to a
/// provider type and/or instance name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub provider_type: Option<String>,
    pub provider_name: Option<String>,
}

/// One hit from [`crate::core::store::ChunkStore::search`]: a chunk and its
/// cosine distance to the query vector, nearest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub distance: f64,
}

/// Citation string for a retrieved chunk: `"[{type}/{name}:{filename}#chunk{n}]"`
/// when both provider fields are non-empty, else `"[{filename}#chunk{n}]"`.
pub fn citation(provider_type: &str, provider_name: &str, filename: &str, chunk_num: i32) -> String {
    if provider_type.is_empty() || provider_name.is_empty() {
        format!("[{filename}#chunk{chunk_num}]")
    } else {
        format!("[{provider_type}/{provider_name}:{filename}#chunk{chunk_num}]")
    }
}

/// Document-level address string for `/docsearch`: `"{type}/{name}:{filename}"`
/// when both provider fields are non-empty, else `filename`.
pub fn address(provider_type: &str, provider_name: &str, filename: &str) -> String {
    if provider_type.is_empty() || provider_name.is_empty() {
        filename.to_string()
    } else {
        format!("{provider_type}/{provider_name}:{filename}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citation_with_provider() {
        assert_eq!(citation("s3", "bucket-a", "a.txt", 2), "[s3/bucket-a:a.txt#chunk2]");
    }

    #[test]
    fn citation_without_provider() {
        assert_eq!(citation("", "", "a.txt", 0), "[a.txt#chunk0]");
    }

    #[test]
    fn address_with_provider() {
        assert_eq!(address("local", "docs", "a.txt"), "local/docs:a.txt");
    }

    #[test]
    fn address_without_provider() {
        assert_eq!(address("", "", "a.txt"), "a.txt");
    }
}
