use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    core::model::{Chunk, ProviderPair, SearchFilters, SearchResult},
    error::RagError,
};

/// One chunk as produced by [`crate::core::service::indexer`], ready to be
/// persisted. Distinct from [`Chunk`] (the stored row) because the owning
/// document/provider identity is passed once per
/// [`ChunkStore::upsert_document_chunks`] call rather than repeated per chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkInput {
    pub chunk_num: i32,
    pub text: String,
    pub char_start: i64,
    pub char_end: i64,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// Count of rows removed by [`ChunkStore::reconcile_orphans`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub documents_removed: u64,
    pub chunks_removed: u64,
}

/// A `(document_id, chunk_num)` target for [`ChunkStore::fetch_context_window`].
#[derive(Debug, Clone)]
pub struct ContextTarget {
    pub document_id: String,
    pub chunk_num: i32,
}

/// The file-tracking row accompanying a chunk write, keyed by
/// `(document_id, pair)`. Omitted when the provider reported no etag for
/// the document, in which case only the chunk rows are written.
#[derive(Debug, Clone)]
pub struct FileTracking<'a> {
    pub etag: &'a str,
    pub last_modified: Option<DateTime<Utc>>,
    pub relative_path: Option<&'a str>,
}

/// Persists chunks and their vectors, tracks per-document indexing state,
/// and supports k-NN similarity search. Implementations must uphold I1-I6
/// regardless of backing store.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Atomically replace the chunk set of `document_id` with `chunks` and,
    /// when `tracking` is given, insert-or-overwrite its tracking row in the
    /// same transaction: a reader must never observe one write without the
    /// other. Guarantees I2/I3/I5.
    async fn upsert_document_chunks(
        &self,
        pair: &ProviderPair,
        document_id: &str,
        filename: &str,
        chunks: &[ChunkInput],
        tracking: Option<FileTracking<'_>>,
    ) -> Result<(), RagError>;

    /// True iff a tracking row exists for `document_id` with exactly `etag`.
    async fn is_indexed(
        &self,
        pair: &ProviderPair,
        document_id: &str,
        etag: &str,
    ) -> Result<bool, RagError>;

    /// Delete tracking + chunk rows for every tracked document of `pair`
    /// absent from `currently_present_ids`.
    async fn reconcile_orphans(
        &self,
        pair: &ProviderPair,
        currently_present_ids: &[String],
    ) -> Result<ReconcileReport, RagError>;

    /// Remove all tracking rows and all chunk rows for `pair`.
    async fn delete_provider(&self, pair: &ProviderPair) -> Result<(), RagError>;

    /// Nearest-first cosine-distance search, optionally filtered by
    /// provider type/name. `|result| <= k`.
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>, RagError>;

    /// For each target, return chunks with `chunk_num` in
    /// `[min_target - w, max_target + w]`, ordered by `chunk_num`.
    async fn fetch_context_window(
        &self,
        targets: &[ContextTarget],
        w: i32,
    ) -> Result<Vec<Chunk>, RagError>;

    async fn count_chunks(&self) -> Result<i64, RagError>;

    async fn count_documents(&self) -> Result<i64, RagError>;
}
