use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{PgPool, Row};

use crate::{
    core::{
        model::{Chunk, ProviderPair, SearchFilters, SearchResult},
        store::{ChunkInput, ChunkStore, ContextTarget, FileTracking, ReconcileReport},
    },
    error::RagError,
    map_err, transaction,
};

/// Postgres-backed [`ChunkStore`] using `pgvector` for the embedding column
/// and runtime-checked `sqlx` queries (no `DATABASE_URL` is available at
/// build time in this environment, so the compile-time `query!` family is
/// not used here).
#[async_trait]
impl ChunkStore for PgPool {
    async fn upsert_document_chunks(
        &self,
        pair: &ProviderPair,
        document_id: &str,
        filename: &str,
        chunks: &[ChunkInput],
        tracking: Option<FileTracking<'_>>,
    ) -> Result<(), RagError> {
        transaction!(self, |tx| {
            map_err!(
                sqlx::query(
                    "DELETE FROM docs_chunks WHERE document_id = $1 AND provider_type = $2 AND provider_name = $3"
                )
                .bind(document_id)
                .bind(&pair.provider_type)
                .bind(&pair.provider_name)
                .execute(&mut *tx)
                .await
            );

            for chunk in chunks {
                map_err!(
                    sqlx::query(
                        "INSERT INTO docs_chunks
                            (document_id, filename, provider_type, provider_name, chunk_num, text, metadata, embedding)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                         ON CONFLICT (document_id, chunk_num) DO UPDATE SET
                            filename = EXCLUDED.filename,
                            provider_type = EXCLUDED.provider_type,
                            provider_name = EXCLUDED.provider_name,
                            text = EXCLUDED.text,
                            metadata = EXCLUDED.metadata,
                            embedding = EXCLUDED.embedding"
                    )
                    .bind(document_id)
                    .bind(filename)
                    .bind(&pair.provider_type)
                    .bind(&pair.provider_name)
                    .bind(chunk.chunk_num)
                    .bind(&chunk.text)
                    .bind(&chunk.metadata)
                    .bind(Vector::from(chunk.embedding.clone()))
                    .execute(&mut *tx)
                    .await
                );
            }

            if let Some(tracking) = tracking {
                map_err!(
                    sqlx::query(
                        "INSERT INTO docs_files (document_id, provider_type, provider_name, filename, etag, last_modified, relative_path)
                         VALUES ($1, $2, $3, $4, $5, $6, $7)
                         ON CONFLICT (document_id, provider_type, provider_name) DO UPDATE SET
                            filename = EXCLUDED.filename,
                            etag = EXCLUDED.etag,
                            last_modified = EXCLUDED.last_modified,
                            relative_path = EXCLUDED.relative_path"
                    )
                    .bind(document_id)
                    .bind(&pair.provider_type)
                    .bind(&pair.provider_name)
                    .bind(filename)
                    .bind(tracking.etag)
                    .bind(tracking.last_modified)
                    .bind(tracking.relative_path)
                    .execute(&mut *tx)
                    .await
                );
            }

            Ok(())
        })
    }

    async fn is_indexed(&self, pair: &ProviderPair, document_id: &str, etag: &str) -> Result<bool, RagError> {
        let row = map_err!(
            sqlx::query(
                "SELECT 1 FROM docs_files
                 WHERE document_id = $1 AND provider_type = $2 AND provider_name = $3 AND etag = $4"
            )
            .bind(document_id)
            .bind(&pair.provider_type)
            .bind(&pair.provider_name)
            .bind(etag)
            .fetch_optional(self)
            .await
        );
        Ok(row.is_some())
    }

    async fn reconcile_orphans(
        &self,
        pair: &ProviderPair,
        currently_present_ids: &[String],
    ) -> Result<ReconcileReport, RagError> {
        let chunks_removed = map_err!(
            sqlx::query(
                "DELETE FROM docs_chunks
                 WHERE provider_type = $1 AND provider_name = $2 AND NOT (document_id = ANY($3))"
            )
            .bind(&pair.provider_type)
            .bind(&pair.provider_name)
            .bind(currently_present_ids)
            .execute(self)
            .await
        )
        .rows_affected();

        let documents_removed = map_err!(
            sqlx::query(
                "DELETE FROM docs_files
                 WHERE provider_type = $1 AND provider_name = $2 AND NOT (document_id = ANY($3))"
            )
            .bind(&pair.provider_type)
            .bind(&pair.provider_name)
            .bind(currently_present_ids)
            .execute(self)
            .await
        )
        .rows_affected();

        Ok(ReconcileReport { documents_removed, chunks_removed })
    }

    async fn delete_provider(&self, pair: &ProviderPair) -> Result<(), RagError> {
        transaction!(self, |tx| {
            map_err!(
                sqlx::query("DELETE FROM docs_chunks WHERE provider_type = $1 AND provider_name = $2")
                    .bind(&pair.provider_type)
                    .bind(&pair.provider_name)
                    .execute(&mut *tx)
                    .await
            );
            map_err!(
                sqlx::query("DELETE FROM docs_files WHERE provider_type = $1 AND provider_name = $2")
                    .bind(&pair.provider_type)
                    .bind(&pair.provider_name)
                    .execute(&mut *tx)
                    .await
            );
            Ok(())
        })
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>, RagError> {
        let vector = Vector::from(query_vector.to_vec());
        let mut builder = sqlx::query_builder::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT document_id, filename, provider_type, provider_name, chunk_num, text, metadata,
                    embedding, created_at, embedding <=> "
        );
        builder.push_bind(vector.clone());
        builder.push(" AS distance FROM docs_chunks WHERE 1 = 1");

        if let Some(provider_type) = &filters.provider_type {
            builder.push(" AND provider_type = ").push_bind(provider_type);
        }
        if let Some(provider_name) = &filters.provider_name {
            builder.push(" AND provider_name = ").push_bind(provider_name);
        }

        builder.push(" ORDER BY embedding <=> ").push_bind(vector).push(" LIMIT ").push_bind(k as i64);

        let rows = map_err!(builder.build().fetch_all(self).await);

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let embedding: Vector = row.try_get("embedding").map_err(RagError::from)?;
            let metadata: serde_json::Value = row.try_get("metadata").map_err(RagError::from)?;
            let (char_start, char_end) = offsets_from_metadata(&metadata);
            results.push(SearchResult {
                chunk: Chunk {
                    document_id: row.try_get("document_id").map_err(RagError::from)?,
                    filename: row.try_get("filename").map_err(RagError::from)?,
                    provider_type: row.try_get("provider_type").map_err(RagError::from)?,
                    provider_name: row.try_get("provider_name").map_err(RagError::from)?,
                    chunk_num: row.try_get("chunk_num").map_err(RagError::from)?,
                    text: row.try_get("text").map_err(RagError::from)?,
                    char_start,
                    char_end,
                    embedding: embedding.to_vec(),
                    metadata,
                    created_at: row.try_get("created_at").map_err(RagError::from)?,
                },
                distance: row.try_get::<f64, _>("distance").map_err(RagError::from)?,
            });
        }

        Ok(results)
    }

    async fn fetch_context_window(&self, targets: &[ContextTarget], w: i32) -> Result<Vec<Chunk>, RagError> {
        let mut out = Vec::new();
        for target in targets {
            let rows = map_err!(
                sqlx::query(
                    "SELECT document_id, filename, provider_type, provider_name, chunk_num, text, metadata,
                            embedding, created_at
                     FROM docs_chunks
                     WHERE document_id = $1 AND chunk_num BETWEEN $2 AND $3
                     ORDER BY chunk_num"
                )
                .bind(&target.document_id)
                .bind(target.chunk_num - w)
                .bind(target.chunk_num + w)
                .fetch_all(self)
                .await
            );

            for row in rows {
                let embedding: Vector = row.try_get("embedding").map_err(RagError::from)?;
                let metadata: serde_json::Value = row.try_get("metadata").map_err(RagError::from)?;
                let (char_start, char_end) = offsets_from_metadata(&metadata);
                out.push(Chunk {
                    document_id: row.try_get("document_id").map_err(RagError::from)?,
                    filename: row.try_get("filename").map_err(RagError::from)?,
                    provider_type: row.try_get("provider_type").map_err(RagError::from)?,
                    provider_name: row.try_get("provider_name").map_err(RagError::from)?,
                    chunk_num: row.try_get("chunk_num").map_err(RagError::from)?,
                    text: row.try_get("text").map_err(RagError::from)?,
                    char_start,
                    char_end,
                    embedding: embedding.to_vec(),
                    metadata,
                    created_at: row.try_get("created_at").map_err(RagError::from)?,
                });
            }
        }
        Ok(out)
    }

    async fn count_chunks(&self) -> Result<i64, RagError> {
        let row = map_err!(sqlx::query("SELECT COUNT(*) AS n FROM docs_chunks").fetch_one(self).await);
        Ok(row.try_get("n").map_err(RagError::from)?)
    }

    async fn count_documents(&self) -> Result<i64, RagError> {
        let row = map_err!(sqlx::query("SELECT COUNT(*) AS n FROM docs_files").fetch_one(self).await);
        Ok(row.try_get("n").map_err(RagError::from)?)
    }
}

fn offsets_from_metadata(metadata: &serde_json::Value) -> (i64, i64) {
    let start = metadata.get("char_start").and_then(|v| v.as_i64()).unwrap_or(0);
    let end = metadata.get("char_end").and_then(|v| v.as_i64()).unwrap_or(0);
    (start, end)
}

#[cfg(test)]
#[suitest::suite(pg_chunk_store_int)]
mod tests {
    use chrono::Utc;
    use suitest::before_all;

    use crate::{
        app::test::{init_postgres, PostgresContainer},
        core::{
            model::{ProviderPair, SearchFilters},
            store::{ChunkInput, ChunkStore, ContextTarget, FileTracking},
        },
    };

    use super::*;

    fn chunk(chunk_num: i32, text: &str) -> ChunkInput {
        ChunkInput {
            chunk_num,
            text: text.to_string(),
            char_start: 0,
            char_end: text.len() as i64,
            embedding: vec![0.1; crate::DEFAULT_EMBEDDING_DIM],
            metadata: serde_json::json!({}),
        }
    }

    /// Every chunk currently stored for `document_id`, read through
    /// [`ChunkStore::fetch_context_window`] with a window wide enough to
    /// cover the whole document, independent of vector distance ordering.
    async fn chunk_numbers(repo: &PgPool, document_id: &str) -> Vec<i32> {
        let target = ContextTarget { document_id: document_id.to_string(), chunk_num: 0 };
        let mut numbers: Vec<i32> =
            repo.fetch_context_window(&[target], 1000).await.unwrap().into_iter().map(|c| c.chunk_num).collect();
        numbers.sort();
        numbers
    }

    #[before_all]
    async fn setup() -> (PgPool, PostgresContainer) {
        init_postgres().await
    }

    #[test]
    async fn upsert_replaces_chunk_set_exactly(repo: PgPool) {
        let pair = ProviderPair::new("local", "p2p");
        let chunks = vec![chunk(0, "first"), chunk(1, "second"), chunk(2, "third")];
        let tracking = FileTracking { etag: "etag-1", last_modified: Some(Utc::now()), relative_path: Some("a.txt") };

        repo.upsert_document_chunks(&pair, "doc-1", "a.txt", &chunks, Some(tracking)).await.unwrap();

        assert_eq!(chunk_numbers(&repo, "doc-1").await, vec![0, 1, 2]);
        assert!(repo.is_indexed(&pair, "doc-1", "etag-1").await.unwrap());
    }

    #[test]
    async fn upsert_is_idempotent(repo: PgPool) {
        let pair = ProviderPair::new("local", "p2p");
        let chunks = vec![chunk(0, "one"), chunk(1, "two")];
        let tracking = FileTracking { etag: "etag-2", last_modified: None, relative_path: None };

        repo.upsert_document_chunks(&pair, "doc-2", "b.txt", &chunks, Some(tracking.clone())).await.unwrap();
        repo.upsert_document_chunks(&pair, "doc-2", "b.txt", &chunks, Some(tracking)).await.unwrap();

        assert_eq!(chunk_numbers(&repo, "doc-2").await, vec![0, 1]);
    }

    #[test]
    async fn upsert_drops_stale_chunks_on_shrink(repo: PgPool) {
        let pair = ProviderPair::new("local", "p2p");
        let first = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")];
        repo.upsert_document_chunks(&pair, "doc-3", "c.txt", &first, None).await.unwrap();

        let second = vec![chunk(0, "a-revised")];
        repo.upsert_document_chunks(&pair, "doc-3", "c.txt", &second, None).await.unwrap();

        assert_eq!(chunk_numbers(&repo, "doc-3").await, vec![0]);
    }

    #[test]
    async fn tracking_row_omitted_without_etag(repo: PgPool) {
        let pair = ProviderPair::new("local", "p2p");
        let chunks = vec![chunk(0, "untracked")];
        repo.upsert_document_chunks(&pair, "doc-4", "d.txt", &chunks, None).await.unwrap();

        assert!(!repo.is_indexed(&pair, "doc-4", "").await.unwrap());
    }

    #[test]
    async fn reconcile_orphans_keeps_only_present_documents(repo: PgPool) {
        let pair = ProviderPair::new("local", "reconcile-test");
        repo.upsert_document_chunks(&pair, "doc-5", "e.txt", &vec![chunk(0, "e")], None).await.unwrap();
        repo.upsert_document_chunks(&pair, "doc-6", "f.txt", &vec![chunk(0, "f")], None).await.unwrap();

        let report = repo.reconcile_orphans(&pair, &["doc-5".to_string()]).await.unwrap();
        assert_eq!(report.documents_removed, 0);
        assert_eq!(report.chunks_removed, 1);

        assert_eq!(chunk_numbers(&repo, "doc-5").await, vec![0]);
        assert!(chunk_numbers(&repo, "doc-6").await.is_empty());
    }

    #[test]
    async fn search_top_k_is_monotonic_prefix(repo: PgPool) {
        // Scoped to its own provider name so ties with other tests' chunks
        // can't perturb the ordering this test depends on.
        let pair = ProviderPair::new("local", "topk-test");
        for i in 0..5 {
            let mut c = chunk(0, "g");
            c.embedding[0] = 0.1 + i as f32 * 0.05;
            repo.upsert_document_chunks(&pair, &format!("doc-k{i}"), "g.txt", &vec![c], None).await.unwrap();
        }

        let filters = SearchFilters { provider_type: None, provider_name: Some("topk-test".to_string()) };
        let query = vec![0.1; crate::DEFAULT_EMBEDDING_DIM];
        let small = repo.search(&query, 2, &filters).await.unwrap();
        let large = repo.search(&query, 4, &filters).await.unwrap();

        let small_distances: Vec<f64> = small.iter().map(|r| r.distance).collect();
        let large_prefix: Vec<f64> = large.iter().take(small.len()).map(|r| r.distance).collect();
        assert_eq!(small_distances, large_prefix);
    }

    #[test]
    async fn embedding_dimension_mismatch_is_rejected(repo: PgPool) {
        let pair = ProviderPair::new("local", "p2p");
        let mut bad = chunk(0, "wrong dimension");
        bad.embedding = vec![0.1; 8];

        let result = repo.upsert_document_chunks(&pair, "doc-bad", "h.txt", &vec![bad], None).await;
        assert!(result.is_err());
    }
}
