pub mod docx;
pub mod text;

use std::sync::Arc;

use crate::core::extractor::ExtractorRegistry;

/// Wires the built-in extractors in registration order: plain text first,
/// then DOCX. Optional extractors (PDF, ODT, ...) are not implemented;
/// their extensions fall through to `Unsupported`.
pub fn builtin_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(Arc::new(text::TextExtractor));
    registry.register(Arc::new(docx::DocxExtractor));
    registry
}
