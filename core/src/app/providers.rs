pub mod local;
pub mod onedrive;
pub mod s3;

use std::{sync::Arc, time::Duration};

use crate::{
    core::provider::{DynProvider, ProviderFactory},
    err,
    error::RagError,
};

/// The one [`ProviderFactory`] wired into both binaries: a match over
/// `provider_type` tags, each deserializing its own settings shape. Adding
/// a provider type means adding an arm here, nothing else. `request_timeout`
/// bounds every outbound call the constructed providers make.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProviderFactory {
    request_timeout: Duration,
}

impl BuiltinProviderFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl ProviderFactory for BuiltinProviderFactory {
    fn build(
        &self,
        provider_type: &str,
        provider_name: &str,
        settings: &serde_json::Value,
    ) -> Result<DynProvider, RagError> {
        match provider_type {
            "local" => {
                let settings: local::LocalSettings = serde_json::from_value(settings.clone())?;
                Ok(Arc::new(local::LocalProvider::new(provider_name.to_string(), settings)) as DynProvider)
            }
            "s3" => {
                let settings: s3::S3Settings = serde_json::from_value(settings.clone())?;
                Ok(Arc::new(s3::S3Provider::new(provider_name.to_string(), settings, self.request_timeout))
                    as DynProvider)
            }
            "onedrive" => {
                let settings: onedrive::OneDriveSettings = serde_json::from_value(settings.clone())?;
                Ok(Arc::new(onedrive::OneDriveProvider::new(
                    provider_name.to_string(),
                    settings,
                    self.request_timeout,
                )) as DynProvider)
            }
            other => err!(Configuration, format!("unknown provider_type: {other}")),
        }
    }
}
