use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    core::{
        model::{ProviderPair, ProviderRegistryEntry},
        registry::ProviderRegistry,
    },
    error::RagError,
    map_err,
};

#[async_trait]
impl ProviderRegistry for PgPool {
    async fn register(&self, pair: &ProviderPair, metadata: serde_json::Value) -> Result<(), RagError> {
        map_err!(
            sqlx::query(
                "INSERT INTO providers (provider_type, provider_name, registered_at, metadata)
                 VALUES ($1, $2, now(), $3)
                 ON CONFLICT (provider_type, provider_name) DO UPDATE SET metadata = EXCLUDED.metadata"
            )
            .bind(&pair.provider_type)
            .bind(&pair.provider_name)
            .bind(&metadata)
            .execute(self)
            .await
        );
        Ok(())
    }

    async fn stamp_last_sync(&self, pair: &ProviderPair, at: DateTime<Utc>) -> Result<(), RagError> {
        map_err!(
            sqlx::query(
                "UPDATE providers SET last_sync_at = $3 WHERE provider_type = $1 AND provider_name = $2"
            )
            .bind(&pair.provider_type)
            .bind(&pair.provider_name)
            .bind(at)
            .execute(self)
            .await
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProviderRegistryEntry>, RagError> {
        let rows = map_err!(
            sqlx::query_as::<_, ProviderRegistryEntry>(
                "SELECT provider_type, provider_name, enabled, registered_at, last_sync_at, metadata FROM providers
                 ORDER BY provider_type, provider_name"
            )
            .fetch_all(self)
            .await
        );
        Ok(rows)
    }
}
