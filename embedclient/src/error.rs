use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("embedding api error: {0}")]
    Api(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
