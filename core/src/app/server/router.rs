use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::{classify::ServerErrorsFailureClass, cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

use super::dto::{HealthResponse, ProvidersResponse};
use crate::{
    app::state::AppState,
    core::service::{
        chat::ChatRequest,
        docsearch::DocSearchRequest,
        query::QueryRequest,
    },
    error::RagError,
};

/// Builds the query service's axum [`Router`]. CORS is restricted to
/// `origins`; everything but `/health` runs behind the trace layer so
/// request/response logging covers the real failure modes. Per-call
/// timeouts on the database pool and outbound provider/model clients
/// are applied where those calls are made, in [`crate::app::state`].
pub fn router(state: AppState, origins: Vec<String>) -> Router {
    let origins = origins.into_iter().map(|origin| HeaderValue::from_str(&origin)).map(Result::unwrap);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(origins))
        .allow_headers(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST]);

    Router::new()
        .route("/providers", get(list_providers))
        .route("/query", post(query))
        .route("/chat", post(chat))
        .route("/docsearch", post(docsearch))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .on_request(|req: &axum::http::Request<_>, _span: &Span| {
                    tracing::info!(method = %req.method(), path = %req.uri().path(), "processing request");
                })
                .on_response(|res: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                    tracing::info!(status = %res.status(), latency_ms = latency.as_millis(), "sending response");
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    tracing::error!(%error, "error in request");
                }),
        )
        .layer(cors)
        .route("/health", get(health))
}

/// Doubles as a liveness and readiness probe: a cheap `SELECT 1` against
/// the chunk store backs `chunk_store_reachable` without failing the
/// whole request on a database outage.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let counts = async {
        let chunks = state.store.count_chunks().await?;
        let documents = state.store.count_documents().await?;
        Ok::<_, RagError>((chunks, documents))
    }
    .await;

    let (chunks, documents, reachable) = match counts {
        Ok((chunks, documents)) => (chunks, documents, true),
        Err(e) => {
            e.print();
            (0, 0, false)
        }
    };

    Json(HealthResponse { status: "ok", chunks, documents, chunk_store_reachable: reachable })
}

async fn list_providers(State(state): State<AppState>) -> Result<impl IntoResponse, RagError> {
    let providers = state.registry.list().await?;
    Ok(Json(ProvidersResponse { providers }))
}

async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Result<impl IntoResponse, RagError> {
    let response = state.query.answer(request).await?;
    Ok(Json(response))
}

async fn docsearch(
    State(state): State<AppState>,
    Json(request): Json<DocSearchRequest>,
) -> Result<impl IntoResponse, RagError> {
    let response = state.docsearch.search(request).await?;
    Ok(Json(response))
}

/// Non-streaming calls return one JSON body; `stream_steps: true` switches
/// to a line-delimited-JSON response body, one [`ChatEvent`](crate::core::service::chat::ChatEvent)
/// per line, terminated by the `final` event.
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Result<axum::response::Response, RagError> {
    if !request.stream_steps.unwrap_or(false) {
        let response = state.chat.run(request).await?;
        return Ok(Json(response).into_response());
    }

    let (tx, rx) = mpsc::channel(16);
    let chat = state.chat.clone();
    tokio::spawn(async move {
        chat.run_streaming(request, tx).await;
    });

    let body_stream = ReceiverStream::new(rx).map(|event| {
        let mut line = serde_json::to_vec(&event).unwrap_or_default();
        line.push(b'\n');
        Ok::<_, std::io::Error>(axum::body::Bytes::from(line))
    });

    let mut response = axum::response::Response::new(Body::from_stream(body_stream));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));
    Ok(response)
}
