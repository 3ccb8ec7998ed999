use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{model::DocumentDescriptor, provider::Provider},
    err,
    error::RagError,
};

const GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

#[derive(Debug, Clone, Deserialize)]
pub struct OneDriveSettings {
    pub enabled: bool,
    pub drive_id: String,
    #[serde(default)]
    pub folder_path: Option<String>,
    pub access_token: String,
}

/// Wraps a OneDrive/SharePoint drive folder via the Microsoft Graph API.
/// `etag` is the drive item's `cTag`, which changes on content edits but
/// not on metadata-only updates like renames.
pub struct OneDriveProvider {
    name: String,
    drive_id: String,
    folder_path: Option<String>,
    access_token: String,
    client: reqwest::Client,
}

impl OneDriveProvider {
    pub fn new(name: String, settings: OneDriveSettings, request_timeout: Duration) -> Self {
        Self {
            name,
            drive_id: settings.drive_id,
            folder_path: settings.folder_path,
            access_token: settings.access_token,
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("static reqwest client config is always valid"),
        }
    }

    fn children_url(&self) -> String {
        match &self.folder_path {
            Some(path) if !path.is_empty() => {
                format!("{GRAPH_ENDPOINT}/drives/{}/root:/{path}:/children", self.drive_id)
            }
            _ => format!("{GRAPH_ENDPOINT}/drives/{}/root/children", self.drive_id),
        }
    }

    fn document_id(&self, item_id: &str) -> String {
        format!("onedrive:{}:{item_id}", self.name)
    }

    fn item_id_of<'a>(&self, document_id: &'a str) -> Result<&'a str, RagError> {
        let prefix = format!("onedrive:{}:", self.name);
        document_id
            .strip_prefix(prefix.as_str())
            .ok_or_else(|| RagError::from(crate::error::RagErr::DoesNotExist(document_id.to_string())))
    }
}

#[async_trait]
impl Provider for OneDriveProvider {
    fn provider_type(&self) -> &'static str {
        "onedrive"
    }

    async fn enumerate(&self, cancel: &CancellationToken) -> Result<Vec<DocumentDescriptor>, RagError> {
        let mut out = Vec::new();
        let mut next_url = Some(self.children_url());

        while let Some(url) = next_url {
            if cancel.is_cancelled() {
                return err!(Cancelled);
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| RagError::from(crate::error::RagErr::Provider(e.to_string())))?;

            let page: DriveChildrenPage = response.json().await?;

            for item in page.value {
                if item.folder.is_some() {
                    continue;
                }

                out.push(DocumentDescriptor {
                    document_id: self.document_id(&item.id),
                    filename: item.name.clone(),
                    relative_path: Some(item.name),
                    etag: item.c_tag.unwrap_or_default(),
                    last_modified: item.last_modified_date_time,
                    provider_type: self.provider_type().to_string(),
                    provider_name: self.name.clone(),
                });
            }

            next_url = page.next_link;
        }

        Ok(out)
    }

    async fn fetch(&self, document_id: &str) -> Result<Vec<u8>, RagError> {
        let item_id = self.item_id_of(document_id)?;
        let url = format!("{GRAPH_ENDPOINT}/drives/{}/items/{item_id}/content", self.drive_id);

        let response = self.client.get(&url).bearer_auth(&self.access_token).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return err!(DoesNotExist, document_id.to_string());
        }

        let response = response
            .error_for_status()
            .map_err(|e| RagError::from(crate::error::RagErr::Provider(e.to_string())))?;

        Ok(response.bytes().await?.to_vec())
    }

    async fn describe(&self) -> Result<serde_json::Value, RagError> {
        Ok(serde_json::json!({
            "kind": "onedrive",
            "drive_id": self.drive_id,
            "folder_path": self.folder_path,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct DriveChildrenPage {
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
    #[serde(rename = "cTag")]
    c_tag: Option<String>,
    #[serde(rename = "lastModifiedDateTime")]
    last_modified_date_time: Option<chrono::DateTime<chrono::Utc>>,
    folder: Option<FolderFacet>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FolderFacet {
    #[serde(rename = "childCount")]
    child_count: Option<u64>,
}
