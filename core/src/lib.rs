pub mod app;
pub mod config;
pub mod core;
pub mod error;

/// Default cosine-distance embedding dimension used when a provider's
/// `AiSettings` does not override it.
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Default number of texts sent to the embedder per remote call.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 16;
