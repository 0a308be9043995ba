// photobackup/src/destinations/gdrive.rs
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::{DestinationStore, FolderCreation, FolderHandle, file_body};
use crate::config::DestinationConfig;
use crate::errors::{AppError, Result};
use crate::utils::http::ensure_success;

const SERVICE: &str = "Google Drive";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    items: Vec<DriveFile>,
}

#[derive(Debug, Serialize)]
struct ParentRef<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    parents: Vec<ParentRef<'a>>,
}

/// Google Drive v2 client. Folders live directly under the drive root and
/// are addressed by file id.
pub struct GoogleDrive {
    http: Client,
    base_url: String,
    token: String,
}

impl GoogleDrive {
    pub fn new(http: Client, config: &DestinationConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn transport(context: &str, err: reqwest::Error) -> AppError {
        AppError::network(SERVICE, format!("{}: {}", context, err))
    }

    /// Creates a file resource (folder or photo) and returns its id.
    async fn insert(&self, metadata: &NewFile<'_>) -> Result<DriveFile> {
        let response = self
            .http
            .post(format!("{}/drive/v2/files", self.base_url))
            .bearer_auth(&self.token)
            .json(metadata)
            .send()
            .await
            .map_err(|e| Self::transport("file insert failed", e))?;
        ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| Self::transport("file insert body unreadable", e))
    }
}

/// Drive only knows titles; nested paths collapse to their last segment.
fn folder_title(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

fn folder_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "'root' in parents and trashed=false and title='{}' and mimeType='{}'",
        escaped, FOLDER_MIME
    )
}

fn pick_folder<'a>(files: &'a [DriveFile], title: &str) -> Option<&'a DriveFile> {
    files
        .iter()
        .find(|f| f.title == title && f.mime_type == FOLDER_MIME)
}

#[async_trait]
impl DestinationStore for GoogleDrive {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn check_access(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/drive/v2/about", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("fields", "name")])
            .send()
            .await
            .map_err(|e| Self::transport("about request failed", e))?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    async fn find_folder(&self, path: &str) -> Result<Option<FolderHandle>> {
        let title = folder_title(path);
        let response = self
            .http
            .get(format!("{}/drive/v2/files", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("q", folder_query(title))])
            .send()
            .await
            .map_err(|e| Self::transport("folder listing failed", e))?;
        let list: FileList = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| Self::transport("folder listing body unreadable", e))?;
        Ok(pick_folder(&list.items, title).map(|f| FolderHandle {
            store: SERVICE.to_string(),
            path: path.to_string(),
            id: f.id.clone(),
        }))
    }

    async fn create_folder(&self, path: &str) -> Result<FolderCreation> {
        let created = self
            .insert(&NewFile {
                title: folder_title(path),
                mime_type: Some(FOLDER_MIME),
                parents: vec![ParentRef { id: "root" }],
            })
            .await?;
        Ok(FolderCreation::Created(FolderHandle {
            store: SERVICE.to_string(),
            path: path.to_string(),
            id: created.id,
        }))
    }

    async fn upload_file(&self, folder: &FolderHandle, local_path: &Path, file_name: &str) -> Result<()> {
        let resource = self
            .insert(&NewFile {
                title: file_name,
                mime_type: None,
                parents: vec![ParentRef { id: &folder.id }],
            })
            .await?;

        let (body, length) = file_body(local_path).await?;
        let response = self
            .http
            .put(format!("{}/upload/drive/v2/files/{}", self.base_url, resource.id))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media")])
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transport("media upload failed", e))?;
        ensure_success(SERVICE, response).await?;
        info!(store = SERVICE, file = file_name, file_id = %resource.id, bytes = length, "uploaded photo");
        Ok(())
    }
}
