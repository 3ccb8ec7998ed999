use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        completion::Completion,
        embedder::Embedder,
        model::{citation, SearchFilters},
        settings::Configuration,
        store::ChunkStore,
    },
    error::RagError,
};

const NO_CONTEXT_ANSWER: &str = "I could not find anything relevant.";

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub top_k: Option<usize>,
    pub provider_type: Option<String>,
    pub provider_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub document_id: String,
    pub filename: String,
    pub chunk_num: i32,
    pub text: String,
    pub distance: f64,
    pub citation: String,
    pub provider_type: String,
    pub provider_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub tokens_used: u32,
}

/// Answers a single standalone question: embed → k-NN search → compose a
/// cited prompt → call the completion model.
pub struct QueryPipeline {
    configuration: Arc<dyn Configuration>,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn Completion>,
}

impl QueryPipeline {
    pub fn new(
        configuration: Arc<dyn Configuration>,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self { configuration, store, embedder, completion }
    }

    pub async fn answer(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
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

        if results.is_empty() {
            return Ok(QueryResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
                tokens_used: 0,
            });
        }

        let mut sources = Vec::with_capacity(results.len());
        let mut context = String::new();
        for (i, result) in results.iter().enumerate() {
            let label = i + 1;
            context.push_str(&format!("[{label}] {}\n\n", result.chunk.text));
            sources.push(SourceRef {
                document_id: result.chunk.document_id.clone(),
                filename: result.chunk.filename.clone(),
                chunk_num: result.chunk.chunk_num,
                text: result.chunk.text.clone(),
                distance: result.distance,
                citation: citation(
                    &result.chunk.provider_type,
                    &result.chunk.provider_name,
                    &result.chunk.filename,
                    result.chunk.chunk_num,
                ),
                provider_type: result.chunk.provider_type.clone(),
                provider_name: result.chunk.provider_name.clone(),
            });
        }

        let prompt = format!(
            "Context:\n{context}\nQuestion: {}\n\n\
             Answer only from the context above. If the context is insufficient, say so. \
             Cite sources inline using their bracketed numbers, e.g. [1], [2].",
            request.question
        );

        let response = self.completion.complete_large(&prompt).await?;

        Ok(QueryResponse { answer: response.text, sources, tokens_used: response.tokens_used })
    }
}

pub(crate) fn clamp_top_k(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_range() {
        assert_eq!(clamp_top_k(Some(0), 5, 20), 1);
        assert_eq!(clamp_top_k(Some(100), 5, 20), 20);
        assert_eq!(clamp_top_k(None, 5, 20), 5);
        assert_eq!(clamp_top_k(Some(10), 5, 20), 10);
    }
}
