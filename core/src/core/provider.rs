use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{core::model::DocumentDescriptor, error::RagError};

/// Presents one source of documents as a uniform capability set:
/// Enumerate, Fetch, Describe. Implementations are plain values
/// carrying their resolved settings; there is no shared base class, and
/// selection is by the `provider_type` tag a constructor function matches on.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable short tag naming the kind of source, e.g. `"local"`, `"s3"`, `"onedrive"`.
    fn provider_type(&self) -> &'static str;

    /// Enumerate the provider's current documents. Descriptors for the same
    /// underlying file must be stable (same `document_id`) across calls.
    /// Ordering is unspecified.
    async fn enumerate(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentDescriptor>, RagError>;

    /// Fetch the current byte content of `document_id`. Fails with
    /// [`crate::error::RagErr::DoesNotExist`] if the document has
    /// disappeared since enumeration.
    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, RagError>;

    /// Provider metadata suitable for persisting to the `providers`
    /// registry entry (account type, configured root path or bucket, ...).
    async fn describe(&self) -> Result<serde_json::Value, RagError>;
}

pub type DynProvider = Arc<dyn Provider>;

/// Constructs a concrete [`Provider`] from its `provider_type` tag and
/// settings blob. A closed-world enumeration plus a constructor —
/// adding a provider type means adding a match arm here, nothing else.
pub trait ProviderFactory: Send + Sync {
    fn build(
        &self,
        provider_type: &str,
        provider_name: &str,
        settings: &serde_json::Value,
    ) -> Result<DynProvider, RagError>;
}
