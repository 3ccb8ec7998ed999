use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::{
    app::providers::{local::LocalSettings, onedrive::OneDriveSettings, s3::S3Settings},
    core::settings::{AiSettings, Configuration, EnabledProvider},
    error::RagError,
    map_err,
};

/// Deserializes `settings` into the typed shape `provider_type` implies and
/// returns its `enabled` flag. `None` means the blob doesn't match that
/// shape at all (or the type is unrecognized); a failed deserialization
/// already rejects every malformed or mistyped field an administrator
/// could have written. The settings blob is the sole authority on whether
/// a provider participates in a run — the `providers` registry row's own
/// `enabled` column just records that the provider has been seen.
fn settings_enabled(provider_type: &str, settings: &serde_json::Value) -> Option<bool> {
    match provider_type {
        "local" => serde_json::from_value::<LocalSettings>(settings.clone()).ok().map(|s| s.enabled),
        "s3" => serde_json::from_value::<S3Settings>(settings.clone()).ok().map(|s| s.enabled),
        "onedrive" => serde_json::from_value::<OneDriveSettings>(settings.clone()).ok().map(|s| s.enabled),
        _ => None,
    }
}

/// [`Configuration`] backed by the `provider_settings` and `ai_settings`
/// tables. `loaded_at` is an in-memory stamp bumped by [`reload`], so
/// pipelines that capture it at request entry can detect a stale read
/// without re-querying postgres on every call.
pub struct PgConfiguration {
    pool: PgPool,
    loaded_at: RwLock<DateTime<Utc>>,
}

impl PgConfiguration {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, loaded_at: RwLock::new(Utc::now()) }
    }
}

#[async_trait]
impl Configuration for PgConfiguration {
    async fn get_provider_settings(
        &self,
        provider_type: &str,
        provider_name: &str,
    ) -> Result<Option<serde_json::Value>, RagError> {
        let row = map_err!(
            sqlx::query("SELECT settings FROM provider_settings WHERE provider_type = $1 AND provider_name = $2")
                .bind(provider_type)
                .bind(provider_name)
                .fetch_optional(&self.pool)
                .await
        );

        let Some(row) = row else {
            return Ok(None);
        };

        let settings: serde_json::Value = map_err!(row.try_get("settings"));
        match settings_enabled(provider_type, &settings) {
            None => {
                tracing::warn!(provider_type, provider_name, "provider settings failed validation, skipping");
                Ok(None)
            }
            Some(false) => Ok(None),
            Some(true) => Ok(Some(settings)),
        }
    }

    async fn list_enabled_providers(&self) -> Result<Vec<EnabledProvider>, RagError> {
        let rows = map_err!(
            sqlx::query("SELECT provider_type, provider_name, settings FROM provider_settings")
                .fetch_all(&self.pool)
                .await
        );

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let provider_type: String = map_err!(row.try_get("provider_type"));
            let provider_name: String = map_err!(row.try_get("provider_name"));
            let settings: serde_json::Value = map_err!(row.try_get("settings"));
            match settings_enabled(&provider_type, &settings) {
                Some(true) => out.push(EnabledProvider { provider_type, provider_name, settings }),
                Some(false) => {}
                None => {
                    tracing::warn!(provider_type, provider_name, "skipping provider with invalid settings blob")
                }
            }
        }
        Ok(out)
    }

    async fn get_ai_settings(&self) -> Result<AiSettings, RagError> {
        let row = map_err!(
            sqlx::query("SELECT settings FROM ai_settings WHERE singleton_key = 'default'")
                .fetch_optional(&self.pool)
                .await
        );

        let Some(row) = row else {
            return Ok(AiSettings::default());
        };

        let settings: serde_json::Value = map_err!(row.try_get("settings"));
        let parsed: AiSettings = map_err!(serde_json::from_value(settings));
        Ok(parsed)
    }

    async fn reload(&self) -> Result<(), RagError> {
        *self.loaded_at.write().expect("loaded_at lock poisoned") = Utc::now();
        Ok(())
    }

    fn loaded_at(&self) -> DateTime<Utc> {
        *self.loaded_at.read().expect("loaded_at lock poisoned")
    }
}

/// Idempotently seeds `ai_settings` from `OPENAI_API_KEY`/`OPENAI_BASE_URL`
/// if the singleton row doesn't exist yet, so a fresh database doesn't
/// start with an empty api key. `get_ai_settings` already falls back to
/// [`AiSettings::default`] when the row is absent, so this only matters
/// when those two variables are set.
pub async fn seed_ai_settings_from_env(pool: &PgPool) -> Result<(), RagError> {
    let existing = map_err!(
        sqlx::query("SELECT 1 FROM ai_settings WHERE singleton_key = 'default'")
            .fetch_optional(pool)
            .await
    );
    if existing.is_some() {
        return Ok(());
    }

    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        return Ok(());
    };

    let mut settings = AiSettings::default();
    settings.api_key = api_key;
    if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
        settings.base_url = base_url;
    }

    let value = map_err!(serde_json::to_value(&settings));
    map_err!(
        sqlx::query("INSERT INTO ai_settings (singleton_key, settings) VALUES ('default', $1) ON CONFLICT DO NOTHING")
            .bind(value)
            .execute(pool)
            .await
    );
    tracing::info!("seeded ai_settings from environment");
    Ok(())
}

/// Seeds `providers`/`provider_settings` from well-known environment
/// variables, at most one enabled row per recognized provider type, only
/// when `provider_settings` is entirely empty. Runs once at process
/// startup; idempotent because a non-empty table short-circuits it.
pub async fn seed_providers_from_env(pool: &PgPool) -> Result<(), RagError> {
    let existing = map_err!(sqlx::query("SELECT 1 FROM provider_settings").fetch_optional(pool).await);
    if existing.is_some() {
        return Ok(());
    }

    let mut seeded = 0u32;

    if let Ok(root_path) = std::env::var("SEED_LOCAL_ROOT") {
        let settings = serde_json::json!({ "enabled": true, "root_path": root_path });
        insert_seeded_provider(pool, "local", "default", settings).await?;
        seeded += 1;
    }

    if let Ok(bucket) = std::env::var("SEED_S3_BUCKET") {
        let settings = serde_json::json!({
            "enabled": true,
            "bucket": bucket,
            "prefix": std::env::var("SEED_S3_PREFIX").ok(),
            "region": std::env::var("SEED_S3_REGION").ok(),
        });
        insert_seeded_provider(pool, "s3", "default", settings).await?;
        seeded += 1;
    }

    if let (Ok(drive_id), Ok(access_token)) =
        (std::env::var("SEED_ONEDRIVE_DRIVE_ID"), std::env::var("SEED_ONEDRIVE_ACCESS_TOKEN"))
    {
        let settings = serde_json::json!({
            "enabled": true,
            "drive_id": drive_id,
            "folder_path": std::env::var("SEED_ONEDRIVE_FOLDER_PATH").ok(),
            "access_token": access_token,
        });
        insert_seeded_provider(pool, "onedrive", "default", settings).await?;
        seeded += 1;
    }

    if seeded > 0 {
        tracing::info!(seeded, "seeded providers from environment");
    }
    Ok(())
}

async fn insert_seeded_provider(
    pool: &PgPool,
    provider_type: &str,
    provider_name: &str,
    settings: serde_json::Value,
) -> Result<(), RagError> {
    map_err!(
        sqlx::query(
            "INSERT INTO providers (provider_type, provider_name, enabled, registered_at, metadata)
             VALUES ($1, $2, true, now(), '{}'::jsonb)
             ON CONFLICT (provider_type, provider_name) DO NOTHING"
        )
        .bind(provider_type)
        .bind(provider_name)
        .execute(pool)
        .await
    );
    map_err!(
        sqlx::query(
            "INSERT INTO provider_settings (provider_type, provider_name, settings)
             VALUES ($1, $2, $3)
             ON CONFLICT (provider_type, provider_name) DO NOTHING"
        )
        .bind(provider_type)
        .bind(provider_name)
        .bind(settings)
        .execute(pool)
        .await
    );
    Ok(())
}

#[cfg(test)]
#[suitest::suite(pg_configuration_int)]
mod tests {
    use suitest::before_all;

    use crate::app::test::{init_postgres, PostgresContainer};

    use super::*;

    #[before_all]
    async fn setup() -> (PgPool, PostgresContainer) {
        init_postgres().await
    }

    #[test]
    async fn get_provider_settings_is_none_when_disabled_in_blob(pool: PgPool) {
        // `providers.enabled` defaults to true regardless of what the settings
        // blob says, so a disabled blob must still hide the provider.
        insert_seeded_provider(
            &pool,
            "local",
            "disabled-test",
            serde_json::json!({ "enabled": false, "root_path": "/tmp/disabled" }),
        )
        .await
        .unwrap();

        let config = PgConfiguration::new(pool);
        let settings = config.get_provider_settings("local", "disabled-test").await.unwrap();
        assert!(settings.is_none());
    }

    #[test]
    async fn get_provider_settings_is_some_when_enabled_in_blob(pool: PgPool) {
        insert_seeded_provider(
            &pool,
            "local",
            "enabled-test",
            serde_json::json!({ "enabled": true, "root_path": "/tmp/enabled" }),
        )
        .await
        .unwrap();

        let config = PgConfiguration::new(pool);
        let settings = config.get_provider_settings("local", "enabled-test").await.unwrap();
        assert!(settings.is_some());
    }

    #[test]
    async fn list_enabled_providers_excludes_disabled_blobs(pool: PgPool) {
        insert_seeded_provider(
            &pool,
            "local",
            "list-enabled",
            serde_json::json!({ "enabled": true, "root_path": "/tmp/a" }),
        )
        .await
        .unwrap();
        insert_seeded_provider(
            &pool,
            "local",
            "list-disabled",
            serde_json::json!({ "enabled": false, "root_path": "/tmp/b" }),
        )
        .await
        .unwrap();

        let config = PgConfiguration::new(pool);
        let enabled = config.list_enabled_providers().await.unwrap();
        let names: Vec<&str> = enabled.iter().map(|p| p.provider_name.as_str()).collect();

        assert!(names.contains(&"list-enabled"));
        assert!(!names.contains(&"list-disabled"));
    }

    #[test]
    async fn list_enabled_providers_skips_malformed_blobs(pool: PgPool) {
        insert_seeded_provider(&pool, "local", "malformed", serde_json::json!({ "enabled": true }))
            .await
            .unwrap();

        let config = PgConfiguration::new(pool);
        let enabled = config.list_enabled_providers().await.unwrap();
        assert!(!enabled.iter().any(|p| p.provider_name == "malformed"));
    }

    #[test]
    async fn get_ai_settings_falls_back_to_default_when_unset(pool: PgPool) {
        let config = PgConfiguration::new(pool);
        let settings = config.get_ai_settings().await.unwrap();
        assert_eq!(settings.embedding_model, AiSettings::default().embedding_model);
    }

    #[test]
    async fn reload_bumps_loaded_at(pool: PgPool) {
        let config = PgConfiguration::new(pool);
        let before = config.loaded_at();
        config.reload().await.unwrap();
        assert!(config.loaded_at() >= before);
    }
}
