use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        embedder::Embedder,
        model::SearchFilters,
        service::{chat::document_level_view, query::clamp_top_k},
        settings::Configuration,
        store::ChunkStore,
    },
    error::RagError,
};

pub use crate::core::service::chat::DocumentHit;

#[derive(Debug, Clone, Deserialize)]
pub struct DocSearchRequest {
    pub question: String,
    pub top_k: Option<usize>,
    pub provider_type: Option<String>,
    pub provider_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocSearchResponse {
    pub documents: Vec<DocumentHit>,
}

/// `/docsearch`: the same k-NN search as [`crate::core::service::query`],
/// but grouped to one hit per document rather than returned as raw chunks.
/// Reuses [`document_level_view`] so the grouping/truncation rule
/// (best-distance chunk per document, capped, sorted) stays in one place.
pub struct DocSearchPipeline {
    configuration: Arc<dyn Configuration>,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
}

impl DocSearchPipeline {
    pub fn new(configuration: Arc<dyn Configuration>, store: Arc<dyn ChunkStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { configuration, store, embedder }
    }

    pub async fn search(&self, request: DocSearchRequest) -> Result<DocSearchResponse, RagError> {
        if request.question.trim().is_empty() {
            return crate::err!(Validation, "question must not be empty".to_string());
        }

        let ai_settings = self.configuration.get_ai_settings().await?;
        let top_k = clamp_top_k(request.top_k, ai_settings.default_top_k, ai_settings.max_top_k);

        let vector = self.embedder.embed(&request.question).await?;
        let filters = SearchFilters {
            provider_type: request.provider_type.clone(),
            provider_name: request.provider_name.clone(),
        };

        let results = self.store.search(&vector, top_k, &filters).await?;
        Ok(DocSearchResponse { documents: document_level_view(&results) })
    }
}
