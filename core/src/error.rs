pub mod http;

use std::fmt::Display;

pub use ragcore_embedders::EmbeddingError;
use thiserror::Error;

/// Crate-wide error kind. Variant names describe the failure, not the call
/// site; the wrapping [`RagError`] carries the call site.
#[derive(Debug, Error)]
pub enum RagErr {
    #[error("not found: {0}")]
    DoesNotExist(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding count mismatch: {chunks} chunks, {embeddings} embeddings")]
    ChunkCountMismatch { chunks: usize, embeddings: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// A [`RagErr`] tagged with the source location it was constructed at, in
/// the style of a located error wrapper: cheap to build, logs a full cause
/// chain exactly once at the boundary that handles it.
#[derive(Debug)]
pub struct RagError {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    pub error: RagErr,
}

impl RagError {
    pub fn new(file: &'static str, line: u32, column: u32, error: RagErr) -> Self {
        Self { file, line, column, error }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }

    /// Log the full cause chain at the scope boundary that owns this error.
    pub fn print(&self) {
        tracing::error!(
            location = %self.location(),
            error = %self.error,
            "{}",
            self.error
        );
    }
}

impl Display for RagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.location())
    }
}

impl std::error::Error for RagError {}

impl<E> From<E> for RagError
where
    RagErr: From<E>,
{
    #[track_caller]
    fn from(value: E) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
            error: RagErr::from(value),
        }
    }
}

/// Construct an `Err(RagError)` capturing the call site, e.g.
/// `return err!(DoesNotExist, id.to_string())`.
#[macro_export]
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        Err($crate::error::RagError::new(
            file!(),
            line!(),
            column!(),
            $crate::error::RagErr::$variant($($arg)*),
        ))
    };
    ($variant:ident) => {
        Err($crate::error::RagError::new(
            file!(),
            line!(),
            column!(),
            $crate::error::RagErr::$variant,
        ))
    };
}

/// Map any `Result<T, E>` where `RagErr: From<E>` into `Result<T, RagError>`
/// and immediately propagate it with `?`.
#[macro_export]
macro_rules! map_err {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Err($crate::error::RagError::from(e)),
        }
    };
}
