use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    core::{
        embedder::{embed_batch, Embedder},
        extractor::{ExtractOutcome, ExtractorRegistry},
        model::{DocumentDescriptor, ProviderPair},
        provider::{DynProvider, ProviderFactory},
        registry::ProviderRegistry,
        settings::Configuration,
        store::{ChunkInput, ChunkStore, FileTracking},
    },
};

/// Per-run tuning, sourced from the ingestion configuration.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub cleanup_orphans: bool,
    pub force_full_reindex: bool,
    pub max_files: Option<usize>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            cleanup_orphans: true,
            force_full_reindex: false,
            max_files: None,
            chunk_size: chunker::DEFAULT_CHUNK_SIZE,
            chunk_overlap: chunker::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Maps directly to the indexer binary's exit codes: 0/1/130.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    NoOp,
    Cancelled,
    Error,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success | RunStatus::NoOp => 0,
            RunStatus::Error => 1,
            RunStatus::Cancelled => 130,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub providers_processed: u32,
    pub documents_processed: u32,
    pub documents_skipped: u32,
    pub documents_failed: u32,
    pub chunks_written: u64,
    pub elapsed_secs: f64,
    pub status: RunStatus,
}

impl Report {
    fn empty(status: RunStatus) -> Self {
        Self {
            providers_processed: 0,
            documents_processed: 0,
            documents_skipped: 0,
            documents_failed: 0,
            chunks_written: 0,
            elapsed_secs: 0.0,
            status,
        }
    }
}

enum DocumentOutcome {
    Skipped,
    Processed { chunks: usize },
    Failed,
}

/// Orchestrates enumerate → detect change → extract → chunk → embed →
/// upsert → reconcile, once per enabled provider.
pub struct IndexerPipeline {
    configuration: Arc<dyn Configuration>,
    registry: Arc<dyn ProviderRegistry>,
    store: Arc<dyn ChunkStore>,
    extractors: Arc<ExtractorRegistry>,
    embedder: Arc<dyn Embedder>,
    provider_factory: Arc<dyn ProviderFactory>,
    config: IndexerConfig,
}

impl IndexerPipeline {
    pub fn new(
        configuration: Arc<dyn Configuration>,
        registry: Arc<dyn ProviderRegistry>,
        store: Arc<dyn ChunkStore>,
        extractors: Arc<ExtractorRegistry>,
        embedder: Arc<dyn Embedder>,
        provider_factory: Arc<dyn ProviderFactory>,
        config: IndexerConfig,
    ) -> Self {
        Self { configuration, registry, store, extractors, embedder, provider_factory, config }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Report {
        let started = std::time::Instant::now();

        let enabled = match self.configuration.list_enabled_providers().await {
            Ok(p) => p,
            Err(e) => {
                e.print();
                return Report::empty(RunStatus::Error);
            }
        };

        if enabled.is_empty() {
            warn!("no enabled providers; nothing to index");
            return Report::empty(RunStatus::NoOp);
        }

        let mut report = Report::empty(RunStatus::Success);

        'providers: for entry in enabled {
            if cancel.is_cancelled() {
                report.status = RunStatus::Cancelled;
                break 'providers;
            }

            let pair = ProviderPair::new(entry.provider_type.clone(), entry.provider_name.clone());

            let provider = match self.provider_factory.build(
                &entry.provider_type,
                &entry.provider_name,
                &entry.settings,
            ) {
                Ok(p) => p,
                Err(e) => {
                    warn!(provider = %pair, error = %e, "invalid provider settings, skipping");
                    continue;
                }
            };

            if let Ok(metadata) = provider.describe().await {
                if let Err(e) = self.registry.register(&pair, metadata).await {
                    e.print();
                }
            }

            if self.config.force_full_reindex {
                warn!(provider = %pair, "force_full_reindex set, deleting existing chunks and tracking rows");
                if let Err(e) = self.store.delete_provider(&pair).await {
                    e.print();
                }
            }

            let mut descriptors = match provider.enumerate(cancel).await {
                Ok(d) => d,
                Err(e) => {
                    error!(provider = %pair, error = %e, "provider enumeration failed, skipping provider");
                    continue;
                }
            };

            if let Some(max) = self.config.max_files {
                descriptors.truncate(max);
            }

            if self.config.cleanup_orphans {
                let ids: Vec<String> = descriptors.iter().map(|d| d.document_id.clone()).collect();
                match self.store.reconcile_orphans(&pair, &ids).await {
                    Ok(r) => info!(
                        provider = %pair,
                        documents_removed = r.documents_removed,
                        chunks_removed = r.chunks_removed,
                        "orphan reconciliation complete"
                    ),
                    Err(e) => e.print(),
                }
            }

            for descriptor in &descriptors {
                if cancel.is_cancelled() {
                    report.status = RunStatus::Cancelled;
                    break 'providers;
                }

                match self.process_document(&provider, &pair, descriptor, cancel).await {
                    DocumentOutcome::Skipped => report.documents_skipped += 1,
                    DocumentOutcome::Processed { chunks } => {
                        report.documents_processed += 1;
                        report.chunks_written += chunks as u64;
                    }
                    DocumentOutcome::Failed => report.documents_failed += 1,
                }
            }

            if let Err(e) = self.registry.stamp_last_sync(&pair, Utc::now()).await {
                e.print();
            }

            report.providers_processed += 1;
        }

        report.elapsed_secs = started.elapsed().as_secs_f64();

        if report.status != RunStatus::Cancelled {
            report.status = if report.documents_processed > 0 || report.documents_failed == 0 {
                RunStatus::Success
            } else {
                RunStatus::Error
            };
        }

        info!(
            providers = report.providers_processed,
            processed = report.documents_processed,
            skipped = report.documents_skipped,
            failed = report.documents_failed,
            chunks = report.chunks_written,
            elapsed = report.elapsed_secs,
            status = ?report.status,
            "index run complete"
        );

        report
    }

    async fn process_document(
        &self,
        provider: &DynProvider,
        pair: &ProviderPair,
        descriptor: &DocumentDescriptor,
        cancel: &CancellationToken,
    ) -> DocumentOutcome {
        if !descriptor.etag.is_empty() {
            match self.store.is_indexed(pair, &descriptor.document_id, &descriptor.etag).await {
                Ok(true) => return DocumentOutcome::Skipped,
                Ok(false) => {}
                Err(e) => {
                    e.print();
                    return DocumentOutcome::Failed;
                }
            }
        }

        let bytes = match provider.fetch(&descriptor.document_id).await {
            Ok(b) => b,
            Err(e) => {
                error!(document_id = %descriptor.document_id, error = %e, "fetch failed, skipping document");
                return DocumentOutcome::Skipped;
            }
        };

        let text = match self.extractors.extract(&descriptor.filename, &bytes, cancel).await {
            Ok(ExtractOutcome::Text(t)) if !t.trim().is_empty() => t,
            Ok(ExtractOutcome::Text(_)) => {
                warn!(document_id = %descriptor.document_id, "extracted text is empty, skipping");
                return DocumentOutcome::Skipped;
            }
            Ok(ExtractOutcome::Unsupported) => {
                warn!(document_id = %descriptor.document_id, filename = %descriptor.filename, "unsupported file type, skipping");
                return DocumentOutcome::Skipped;
            }
            Err(e) => {
                warn!(document_id = %descriptor.document_id, error = %e, "extraction failed, skipping");
                return DocumentOutcome::Skipped;
            }
        };

        let segments = match chunker::chunk(&text, self.config.chunk_size, self.config.chunk_overlap) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => {
                warn!(document_id = %descriptor.document_id, "zero chunks produced, skipping");
                return DocumentOutcome::Skipped;
            }
            Err(e) => {
                warn!(document_id = %descriptor.document_id, error = %e, "chunker config error, skipping");
                return DocumentOutcome::Skipped;
            }
        };

        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let batch_size = crate::DEFAULT_EMBED_BATCH_SIZE;
        let embeddings = match embed_batch(self.embedder.as_ref(), &texts, batch_size, cancel).await {
            Ok(e) => e,
            Err(e) => {
                error!(document_id = %descriptor.document_id, error = %e, "embedding failed, skipping document");
                return DocumentOutcome::Failed;
            }
        };

        if embeddings.len() != segments.len() {
            error!(
                document_id = %descriptor.document_id,
                chunks = segments.len(),
                embeddings = embeddings.len(),
                "embedding count mismatch, skipping document"
            );
            return DocumentOutcome::Failed;
        }

        let chunks: Vec<ChunkInput> = segments
            .into_iter()
            .zip(embeddings)
            .map(|(segment, embedding)| ChunkInput {
                chunk_num: segment.chunk_num as i32,
                text: segment.text,
                char_start: segment.char_start as i64,
                char_end: segment.char_end as i64,
                embedding,
                metadata: serde_json::json!({
                    "document_id": descriptor.document_id,
                    "filename": descriptor.filename,
                    "provider_type": descriptor.provider_type,
                    "provider_name": descriptor.provider_name,
                    "chunk_num": segment.chunk_num,
                    "char_start": segment.char_start,
                    "char_end": segment.char_end,
                    "etag": descriptor.etag,
                    "last_modified": descriptor.last_modified,
                    "relative_path": descriptor.relative_path,
                }),
            })
            .collect();

        let chunk_count = chunks.len();

        let tracking = (!descriptor.etag.is_empty()).then(|| FileTracking {
            etag: &descriptor.etag,
            last_modified: descriptor.last_modified,
            relative_path: descriptor.relative_path.as_deref(),
        });

        if let Err(e) = self
            .store
            .upsert_document_chunks(pair, &descriptor.document_id, &descriptor.filename, &chunks, tracking)
            .await
        {
            error!(document_id = %descriptor.document_id, error = %e, "chunk store upsert failed");
            return DocumentOutcome::Failed;
        }

        DocumentOutcome::Processed { chunks: chunk_count }
    }
}
