use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::{RagErr, RagError};

impl RagError {
    fn status(&self) -> StatusCode {
        match &self.error {
            RagErr::Validation(_) => StatusCode::BAD_REQUEST,
            RagErr::DoesNotExist(_) => StatusCode::NOT_FOUND,
            RagErr::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            RagErr::Configuration(_)
            | RagErr::UnsupportedFileType(_)
            | RagErr::DimensionMismatch { .. }
            | RagErr::ChunkCountMismatch { .. }
            | RagErr::Provider(_)
            | RagErr::Fatal(_)
            | RagErr::Io(_)
            | RagErr::Sqlx(_)
            | RagErr::SerdeJson(_)
            | RagErr::Utf8(_)
            | RagErr::Reqwest(_)
            | RagErr::Embedding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// User-visible failure contract for the query service: 400 for invalid
/// input, 500 with `{error: "<message>"}` for everything else.
impl IntoResponse for RagError {
    fn into_response(self) -> axum::response::Response {
        self.print();
        let status = self.status();
        let message = match status {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => self.error.to_string(),
            _ => "internal error".to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
