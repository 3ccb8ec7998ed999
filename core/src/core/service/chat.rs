use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    core::{
        completion::Completion,
        embedder::Embedder,
        model::{address, citation, SearchFilters, SearchResult},
        service::query::SourceRef,
        settings::Configuration,
        store::ChunkStore,
    },
    error::RagError,
};

const NO_CONTEXT_ANSWER: &str =
    "I'm sorry, I couldn't find any relevant information. Could you please rephrase your question?";
const MAX_ATTEMPTS: u8 = 2;
const MAX_DOCUMENT_HITS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Option<Vec<HistoryTurn>>,
    pub top_k: Option<usize>,
    pub provider_type: Option<String>,
    pub provider_name: Option<String>,
    pub stream_steps: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    pub document_id: String,
    pub filename: String,
    pub address: String,
    pub text: String,
    pub distance: f64,
    pub provider_type: String,
    pub provider_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub steps: Vec<String>,
    pub files: Vec<DocumentHit>,
    pub sources: Vec<SourceRef>,
    pub tokens_used: u32,
    pub history: Vec<HistoryTurn>,
}

/// One line of a `stream_steps == true` response. `final` is not a
/// reserved word in Rust so the field keeps its wire name as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Step { message: String },
    Final { files: Vec<DocumentHit>, r#final: ChatResponse },
}

#[derive(Debug, Deserialize)]
struct AnswerabilityJson {
    answerable: bool,
    #[serde(default)]
    suggested_query: Option<String>,
}

/// Multi-turn RAG with conversation history, query refinement, and a
/// bounded (at most two attempts) retry that may revise the search phrase.
pub struct ChatPipeline {
    configuration: Arc<dyn Configuration>,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn Completion>,
}

impl ChatPipeline {
    pub fn new(
        configuration: Arc<dyn Configuration>,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self { configuration, store, embedder, completion }
    }

    /// Runs the procedure with no step transport; the returned
    /// [`ChatResponse`] carries the full step transcript directly.
    pub async fn run(&self, request: ChatRequest) -> Result<ChatResponse, RagError> {
        self.execute(request, None).await
    }

    /// Runs the procedure emitting a `{type: "step", message}` event on
    /// `tx` for every step, followed by exactly one terminal
    /// `{type: "final", files, final}` event.
    pub async fn run_streaming(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let result = self.execute(request, Some(tx.clone())).await;
        let event = match result {
            Ok(response) => ChatEvent::Final { files: response.files.clone(), r#final: response },
            Err(e) => {
                e.print();
                let apology = ChatResponse {
                    answer: NO_CONTEXT_ANSWER.to_string(),
                    steps: Vec::new(),
                    files: Vec::new(),
                    sources: Vec::new(),
                    tokens_used: 0,
                    history: Vec::new(),
                };
                ChatEvent::Final { files: Vec::new(), r#final: apology }
            }
        };
        let _ = tx.send(event).await;
    }

    async fn execute(
        &self,
        request: ChatRequest,
        step_tx: Option<mpsc::Sender<ChatEvent>>,
    ) -> Result<ChatResponse, RagError> {
        if request.message.trim().is_empty() {
            return crate::err!(Validation, "message must not be empty".to_string());
        }

        let ai_settings = self.configuration.get_ai_settings().await?;
        let top_k = request.top_k.unwrap_or(ai_settings.default_top_k).clamp(1, ai_settings.max_top_k.max(1));
        let history = request.history.clone().unwrap_or_default();
        let filters = SearchFilters {
            provider_type: request.provider_type.clone(),
            provider_name: request.provider_name.clone(),
        };

        let mut steps = Vec::new();
        let mut tokens_used: u32 = 0;

        let refine_prompt = format!(
            "Rewrite the user's message into a concise search phrase of 5 to 20 words \
             capturing its intent. Strip greetings and pleasantries. Respond with only \
             the phrase.\n\nMessage: {}",
            request.message
        );
        let refined = self.completion.complete_small(&refine_prompt).await?;
        let mut phrase = refined.text.trim().to_string();
        self.emit(&mut steps, &step_tx, format!("Refined query: \"{phrase}\"")).await;

        let mut best_results: Vec<SearchResult> = Vec::new();
        let mut answer_text: Option<String> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let vector = self.embedder.embed(&phrase).await?;
            let results = self.store.search(&vector, top_k, &filters).await?;

            if results.is_empty() {
                if attempt == MAX_ATTEMPTS {
                    self.emit(&mut steps, &step_tx, "No context found for the refined query.".to_string())
                        .await;
                    return Ok(ChatResponse {
                        answer: NO_CONTEXT_ANSWER.to_string(),
                        steps,
                        files: Vec::new(),
                        sources: Vec::new(),
                        tokens_used,
                        history: append_turn(&history, &request.message, NO_CONTEXT_ANSWER),
                    });
                }

                let rephrase_prompt = format!(
                    "The search phrase \"{phrase}\" returned no results. Suggest a different, \
                     concise search phrase (5 to 20 words) for the same user intent. Respond \
                     with only the phrase."
                );
                let rephrased = self.completion.complete_small(&rephrase_prompt).await?;
                phrase = rephrased.text.trim().to_string();
                self.emit(
                    &mut steps,
                    &step_tx,
                    format!("Attempt {attempt} found no results; retrying with \"{phrase}\""),
                )
                .await;
                continue;
            }

            self.emit(&mut steps, &step_tx, format!("Attempt {attempt}: found {} chunks", results.len()))
                .await;
            best_results = results.clone();

            let eval_prompt = evaluability_prompt(&phrase, &results);
            let eval = self.completion.complete_small(&eval_prompt).await?;
            tokens_used += eval.tokens_used;
            let parsed = parse_answerability(&eval.text);

            if !parsed.answerable && attempt < MAX_ATTEMPTS {
                phrase = match parsed.suggested_query {
                    Some(q) if !q.trim().is_empty() => q,
                    _ => {
                        let rephrase_prompt = format!(
                            "The search phrase \"{phrase}\" did not retrieve answerable context. \
                             Suggest a different, concise search phrase (5 to 20 words) for the \
                             same user intent. Respond with only the phrase."
                        );
                        let rephrased = self.completion.complete_small(&rephrase_prompt).await?;
                        rephrased.text.trim().to_string()
                    }
                };
                self.emit(
                    &mut steps,
                    &step_tx,
                    format!("Attempt {attempt} not answerable; retrying with \"{phrase}\""),
                )
                .await;
                continue;
            }

            let chunk_texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
            let answer_prompt = generate_answer_prompt(&phrase, &chunk_texts, &history);
            let generated = self.completion.complete_large(&answer_prompt).await?;
            tokens_used += generated.tokens_used;
            answer_text = Some(generated.text);
            break;
        }

        let answer = answer_text.unwrap_or_else(|| NO_CONTEXT_ANSWER.to_string());

        let sources: Vec<SourceRef> = best_results
            .iter()
            .map(|r| SourceRef {
                document_id: r.chunk.document_id.clone(),
                filename: r.chunk.filename.clone(),
                chunk_num: r.chunk.chunk_num,
                text: r.chunk.text.clone(),
                distance: r.distance,
                citation: citation(
                    &r.chunk.provider_type,
                    &r.chunk.provider_name,
                    &r.chunk.filename,
                    r.chunk.chunk_num,
                ),
                provider_type: r.chunk.provider_type.clone(),
                provider_name: r.chunk.provider_name.clone(),
            })
            .collect();

        let files = document_level_view(&best_results);
        let history = append_turn(&history, &request.message, &format!("Answer:\n{answer}"));

        Ok(ChatResponse { answer, steps, files, sources, tokens_used, history })
    }

    async fn emit(&self, steps: &mut Vec<String>, tx: &Option<mpsc::Sender<ChatEvent>>, message: String) {
        steps.push(message.clone());
        if let Some(tx) = tx {
            let _ = tx.send(ChatEvent::Step { message }).await;
        }
    }
}

fn append_turn(history: &[HistoryTurn], user_message: &str, assistant_message: &str) -> Vec<HistoryTurn> {
    let mut out = history.to_vec();
    out.push(HistoryTurn { role: "user".to_string(), content: user_message.to_string() });
    out.push(HistoryTurn { role: "assistant".to_string(), content: assistant_message.to_string() });
    out
}

fn evaluability_prompt(phrase: &str, results: &[SearchResult]) -> String {
    let context: String = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}\n", i + 1, r.chunk.text))
        .collect();
    format!(
        "Search phrase: \"{phrase}\"\n\nRetrieved context:\n{context}\n\
         Can the search phrase be answered using only this context? Respond with strict JSON: \
         {{\"answerable\": bool, \"suggested_query\": string|null}}."
    )
}

fn parse_answerability(text: &str) -> AnswerabilityJson {
    if let Ok(parsed) = serde_json::from_str::<AnswerabilityJson>(text) {
        return parsed;
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<AnswerabilityJson>(&text[start..=end]) {
                return parsed;
            }
        }
    }
    tracing::debug!(raw = %text, "malformed answerability JSON, defaulting to not answerable");
    AnswerabilityJson { answerable: false, suggested_query: None }
}

fn generate_answer_prompt(phrase: &str, chunks: &[&str], history: &[HistoryTurn]) -> String {
    let context: String =
        chunks.iter().enumerate().map(|(i, c)| format!("[{}] {c}\n\n", i + 1)).collect();
    let transcript: String =
        history.iter().map(|turn| format!("{}: {}\n", turn.role, turn.content)).collect();
    format!(
        "Conversation so far:\n{transcript}\nContext:\n{context}\nSearch phrase: {phrase}\n\n\
         Answer only from the context above, citing sources inline as [1], [2], etc. \
         Acknowledge if the context is insufficient."
    )
}

pub(crate) fn document_level_view(results: &[SearchResult]) -> Vec<DocumentHit> {
    use std::collections::HashMap;

    let mut best: HashMap<String, &SearchResult> = HashMap::new();
    for r in results {
        best.entry(r.chunk.document_id.clone())
            .and_modify(|existing| {
                if r.distance < existing.distance {
                    *existing = r;
                }
            })
            .or_insert(r);
    }

    let mut hits: Vec<DocumentHit> = best
        .into_values()
        .map(|r| DocumentHit {
            document_id: r.chunk.document_id.clone(),
            filename: r.chunk.filename.clone(),
            address: address(&r.chunk.provider_type, &r.chunk.provider_name, &r.chunk.filename),
            text: r.chunk.text.clone(),
            distance: r.distance,
            provider_type: r.chunk.provider_type.clone(),
            provider_name: r.chunk.provider_name.clone(),
        })
        .collect();

    hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(MAX_DOCUMENT_HITS);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_parse_accepts_clean_json() {
        let parsed = parse_answerability(r#"{"answerable": true, "suggested_query": null}"#);
        assert!(parsed.answerable);
        assert!(parsed.suggested_query.is_none());
    }

    #[test]
    fn lenient_parse_extracts_embedded_json() {
        let parsed = parse_answerability(
            "Sure, here is the answer: {\"answerable\": false, \"suggested_query\": \"x\"} done.",
        );
        assert!(!parsed.answerable);
        assert_eq!(parsed.suggested_query.as_deref(), Some("x"));
    }

    #[test]
    fn lenient_parse_defaults_on_garbage() {
        let parsed = parse_answerability("not json at all");
        assert!(!parsed.answerable);
        assert!(parsed.suggested_query.is_none());
    }
}
