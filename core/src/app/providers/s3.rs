use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{model::DocumentDescriptor, provider::Provider},
    err,
    error::RagError,
};

#[derive(Debug, Clone, Deserialize)]
pub struct S3Settings {
    pub enabled: bool,
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Wraps an S3-compatible bucket. `etag` is the object's native ETag with
/// surrounding quotes stripped.
pub struct S3Provider {
    name: String,
    bucket: String,
    prefix: Option<String>,
    region: Option<String>,
    request_timeout: Duration,
    client: tokio::sync::OnceCell<Client>,
}

impl S3Provider {
    pub fn new(name: String, settings: S3Settings, request_timeout: Duration) -> Self {
        Self {
            name,
            bucket: settings.bucket,
            prefix: settings.prefix,
            region: settings.region,
            request_timeout,
            client: tokio::sync::OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
                if let Some(region) = &self.region {
                    loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
                }
                let timeout_config = aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(self.request_timeout)
                    .build();
                loader = loader.timeout_config(timeout_config);
                let config = loader.load().await;
                Client::new(&config)
            })
            .await
    }

    fn document_id(&self, key: &str) -> String {
        format!("s3:{}:{key}", self.name)
    }
}

#[async_trait]
impl Provider for S3Provider {
    fn provider_type(&self) -> &'static str {
        "s3"
    }

    async fn enumerate(&self, cancel: &CancellationToken) -> Result<Vec<DocumentDescriptor>, RagError> {
        let client = self.client().await;
        let mut out = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return err!(Cancelled);
            }

            let mut request = client.list_objects_v2().bucket(&self.bucket);
            if let Some(prefix) = &self.prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response =
                request.send().await.map_err(|e| RagError::from(crate::error::RagErr::Provider(e.to_string())))?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                if key.ends_with('/') {
                    continue;
                }

                let etag = object.e_tag().unwrap_or_default().trim_matches('"').to_string();
                let filename = key.rsplit('/').next().unwrap_or(key).to_string();
                let last_modified = object
                    .last_modified()
                    .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0));

                out.push(DocumentDescriptor {
                    document_id: self.document_id(key),
                    filename,
                    relative_path: Some(key.to_string()),
                    etag,
                    last_modified,
                    provider_type: self.provider_type().to_string(),
                    provider_name: self.name.clone(),
                });
            }

            continuation_token = response.next_continuation_token().map(|s| s.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(out)
    }

    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, RagError> {
        let key = self.key_of(document_id)?;
        let client = self.client().await;

        let response = client.get_object().bucket(&self.bucket).key(&key).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                if e.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    return err!(DoesNotExist, document_id.to_string());
                }
                return err!(Provider, e.to_string());
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| RagError::from(crate::error::RagErr::Provider(e.to_string())))?;

        Ok(bytes.into_bytes().to_vec())
    }

    async fn describe(&self) -> Result<serde_json::Value, RagError> {
        Ok(serde_json::json!({
            "kind": "s3",
            "bucket": self.bucket,
            "prefix": self.prefix,
        }))
    }
}

impl S3Provider {
    fn key_of(&self, document_id: &str) -> Result<String, RagError> {
        let prefix = format!("s3:{}:", self.name);
        document_id
            .strip_prefix(&prefix)
            .map(|s| s.to_string())
            .ok_or_else(|| RagError::from(crate::error::RagErr::DoesNotExist(document_id.to_string())))
    }
}
