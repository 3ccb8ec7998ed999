//! HTTP-specific response shapes that don't otherwise belong to a pipeline.

use serde::Serialize;

use crate::core::model::ProviderRegistryEntry;

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    pub status: &'static str,
    pub chunks: i64,
    pub documents: i64,
    pub chunk_store_reachable: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ProvidersResponse {
    pub providers: Vec<ProviderRegistryEntry>,
}
