use std::fmt::Write;

use async_trait::async_trait;
use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{core::extractor::Extractor, error::RagError};

/// Concatenates OpenXML paragraph text with newlines, skipping empty
/// paragraphs. Corrupted packages log a warning and yield an empty
/// string rather than aborting the pipeline.
pub struct DocxExtractor;

#[async_trait]
impl Extractor for DocxExtractor {
    fn extensions(&self) -> &'static [&'static str] {
        &["docx"]
    }

    async fn extract(&self, bytes: &[u8], cancel: &CancellationToken) -> Result<String, RagError> {
        let docx = match read_docx(bytes) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "corrupted docx package, skipping");
                return Ok(String::new());
            }
        };

        let mut out = String::new();
        for child in docx.document.children {
            if cancel.is_cancelled() {
                break;
            }
            if let DocumentChild::Paragraph(paragraph) = child {
                let text = paragraph_text(&paragraph);
                if text.trim().is_empty() {
                    continue;
                }
                let _ = writeln!(out, "{text}");
            }
        }

        Ok(out)
    }
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut out = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for rchild in &run.children {
                if let RunChild::Text(t) = rchild {
                    out.push_str(&t.text);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn corrupted_package_yields_empty_string() {
        let cancel = CancellationToken::new();
        let text = DocxExtractor.extract(b"not a zip", &cancel).await.unwrap();
        assert_eq!(text, "");
    }
}
