use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{core::extractor::Extractor, error::RagError};

const EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "log", "json", "xml", "yaml", "yml", "sql", "sh", "bat",
];

/// UTF-8 decode with BOM stripping; returns contents verbatim.
pub struct TextExtractor;

#[async_trait]
impl Extractor for TextExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    async fn extract(&self, bytes: &[u8], _cancel: &CancellationToken) -> Result<String, RagError> {
        let bytes = strip_bom(bytes);
        Ok(String::from_utf8_lossy(bytes).to_string())
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strips_bom_and_decodes() {
        let mut input = vec![0xEF, 0xBB, 0xBF];
        input.extend_from_slice("hello".as_bytes());
        let cancel = CancellationToken::new();
        let text = TextExtractor.extract(&input, &cancel).await.unwrap();
        assert_eq!(text, "hello");
    }
}
