use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RagError;

/// Result of dispatching an [`Extractor`] over a byte stream.
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    Text(String),
    Unsupported,
}

/// Produces plain UTF-8 text from a byte stream given its filename.
/// Corrupted input must yield `Ok(String::new())` plus a warning log, never
/// an error that aborts the pipeline.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Lowercased extensions (without the leading dot) this extractor claims.
    fn extensions(&self) -> &'static [&'static str];

    async fn extract(&self, bytes: &[u8], cancel: &CancellationToken) -> Result<String, RagError>;
}

/// Static extension → extractor dispatch table. "First registered wins" is
/// the deterministic tie-break rule when two extractors claim the same
/// extension.
#[derive(Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<&'static str, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self { by_extension: HashMap::new() }
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for ext in extractor.extensions() {
            self.by_extension.entry(ext).or_insert_with(|| extractor.clone());
        }
    }

    fn lookup(&self, filename: &str) -> Option<&Arc<dyn Extractor>> {
        let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
        self.by_extension.get(ext.as_str())
    }

    pub async fn extract(
        &self,
        filename: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ExtractOutcome, RagError> {
        let Some(extractor) = self.lookup(filename) else {
            return Ok(ExtractOutcome::Unsupported);
        };
        let text = extractor.extract(bytes, cancel).await?;
        Ok(ExtractOutcome::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct First;
    struct Second;

    #[async_trait]
    impl Extractor for First {
        fn extensions(&self) -> &'static [&'static str] {
            &["txt"]
        }
        async fn extract(&self, _bytes: &[u8], _cancel: &CancellationToken) -> Result<String, RagError> {
            Ok("first".to_string())
        }
    }

    #[async_trait]
    impl Extractor for Second {
        fn extensions(&self) -> &'static [&'static str] {
            &["txt"]
        }
        async fn extract(&self, _bytes: &[u8], _cancel: &CancellationToken) -> Result<String, RagError> {
            Ok("second".to_string())
        }
    }

    #[tokio::test]
    async fn first_registered_wins() {
        let mut reg = ExtractorRegistry::new();
        reg.register(Arc::new(First));
        reg.register(Arc::new(Second));

        let cancel = CancellationToken::new();
        let outcome = reg.extract("a.txt", b"", &cancel).await.unwrap();
        assert!(matches!(outcome, ExtractOutcome::Text(t) if t == "first"));
    }

    #[tokio::test]
    async fn unclaimed_extension_is_unsupported() {
        let reg = ExtractorRegistry::new();
        let cancel = CancellationToken::new();
        let outcome = reg.extract("a.bin", b"", &cancel).await.unwrap();
        assert!(matches!(outcome, ExtractOutcome::Unsupported));
    }
}
