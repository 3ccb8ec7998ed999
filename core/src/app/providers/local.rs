use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{model::DocumentDescriptor, provider::Provider},
    err, map_err,
    error::RagError,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LocalSettings {
    pub enabled: bool,
    pub root_path: String,
}

/// Recursively enumerates a directory tree on the local filesystem. `etag`
/// is `sha256("{relative_path}:{mtime}:{size}")`, so any rename, touch, or
/// size change invalidates it without needing to hash file contents.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    name: String,
    root: PathBuf,
}

impl LocalProvider {
    pub fn new(name: String, settings: LocalSettings) -> Self {
        Self { name, root: PathBuf::from(settings.root_path) }
    }

    fn document_id(&self, relative_path: &str) -> String {
        format!("local:{}:{relative_path}", self.name)
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn provider_type(&self) -> &'static str {
        "local"
    }

    async fn enumerate(&self, cancel: &CancellationToken) -> Result<Vec<DocumentDescriptor>, RagError> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            if cancel.is_cancelled() {
                return err!(Cancelled);
            }

            let mut entries = map_err!(tokio::fs::read_dir(&dir).await);
            while let Some(entry) = map_err!(entries.next_entry().await) {
                let path = entry.path();
                let metadata = map_err!(entry.metadata().await);

                if metadata.is_dir() {
                    stack.push(path);
                    continue;
                }

                let relative_path = relative_to(&self.root, &path);
                let size = metadata.len();
                let last_modified: Option<DateTime<Utc>> =
                    metadata.modified().ok().map(DateTime::<Utc>::from);
                let mtime_marker = last_modified.map(|t| t.timestamp()).unwrap_or_default();
                let etag = hex::encode(Sha256::digest(
                    format!("{relative_path}:{mtime_marker}:{size}").as_bytes(),
                ));

                let filename = path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_else(|| relative_path.clone());

                out.push(DocumentDescriptor {
                    document_id: self.document_id(&relative_path),
                    filename,
                    relative_path: Some(relative_path),
                    etag,
                    last_modified,
                    provider_type: self.provider_type().to_string(),
                    provider_name: self.name.clone(),
                });
            }
        }

        Ok(out)
    }

    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, RagError> {
        let relative_path = self.relative_path_of(document_id)?;
        let path = self.root.join(&relative_path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                err!(DoesNotExist, document_id.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn describe(&self) -> Result<serde_json::Value, RagError> {
        Ok(serde_json::json!({
            "kind": "local",
            "root_path": self.root.display().to_string(),
        }))
    }
}

impl LocalProvider {
    fn relative_path_of(&self, document_id: &str) -> Result<String, RagError> {
        let prefix = format!("local:{}:", self.name);
        document_id
            .strip_prefix(&prefix)
            .map(|s| s.to_string())
            .ok_or_else(|| RagError::from(crate::error::RagErr::DoesNotExist(document_id.to_string())))
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enumerates_and_fetches_files() {
        let dir = std::env::temp_dir().join(format!("ragcore-local-provider-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("a.txt"), b"hello world").await.unwrap();

        let provider = LocalProvider::new(
            "docs".to_string(),
            LocalSettings { enabled: true, root_path: dir.display().to_string() },
        );

        let cancel = CancellationToken::new();
        let descriptors = provider.enumerate(&cancel).await.unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].filename, "a.txt");

        let bytes = provider.fetch(&descriptors[0].document_id).await.unwrap();
        assert_eq!(bytes, b"hello world");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
