// photobackup/src/destinations/yandex.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::{DestinationStore, FolderCreation, FolderHandle, file_body};
use crate::config::DestinationConfig;
use crate::errors::{AppError, Result};
use crate::utils::http::{ensure_success, status_error};

const SERVICE: &str = "Yandex Disk";

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct UploadTarget {
    href: String,
}

/// Yandex Disk REST client. Folders are addressed by path, so a folder
/// handle's id is its path.
pub struct YandexDisk {
    http: Client,
    base_url: String,
    token: String,
}

impl YandexDisk {
    pub fn new(http: Client, config: &DestinationConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn authorization(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn handle(path: &str) -> FolderHandle {
        FolderHandle {
            store: SERVICE.to_string(),
            path: path.to_string(),
            id: path.to_string(),
        }
    }

    fn transport(context: &str, err: reqwest::Error) -> AppError {
        AppError::network(SERVICE, format!("{}: {}", context, err))
    }
}

#[async_trait]
impl DestinationStore for YandexDisk {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn check_access(&self) -> Result<()> {
        let response = self
            .http
            .get(&self.base_url)
            .header(header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| Self::transport("disk info request failed", e))?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }

    async fn find_folder(&self, path: &str) -> Result<Option<FolderHandle>> {
        let response = self
            .http
            .get(format!("{}/resources", self.base_url))
            .header(header::AUTHORIZATION, self.authorization())
            .query(&[("path", path), ("fields", "type,path")])
            .send()
            .await
            .map_err(|e| Self::transport("resource lookup failed", e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(SERVICE, response).await?;
        let resource: Resource = response
            .json()
            .await
            .map_err(|e| Self::transport("resource body unreadable", e))?;
        if resource.kind != "dir" {
            return Err(AppError::Config(format!(
                "'{}' exists on {} but is not a folder",
                path, SERVICE
            )));
        }
        Ok(Some(Self::handle(path)))
    }

    async fn create_folder(&self, path: &str) -> Result<FolderCreation> {
        let response = self
            .http
            .put(format!("{}/resources", self.base_url))
            .header(header::AUTHORIZATION, self.authorization())
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| Self::transport("folder creation failed", e))?;
        interpret_create_status(path, response.status())
            .map_err(|status| status_error(SERVICE, status, "folder creation rejected"))
    }

    async fn upload_file(&self, folder: &FolderHandle, local_path: &Path, file_name: &str) -> Result<()> {
        let remote_path = format!("{}/{}", folder.id, file_name);
        let response = self
            .http
            .get(format!("{}/resources/upload", self.base_url))
            .header(header::AUTHORIZATION, self.authorization())
            .query(&[("path", remote_path.as_str()), ("overwrite", "true")])
            .send()
            .await
            .map_err(|e| Self::transport("upload target request failed", e))?;
        let target: UploadTarget = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| Self::transport("upload target body unreadable", e))?;
        debug!(remote_path = %remote_path, "received upload target");

        let (body, length) = file_body(local_path).await?;
        let response = self
            .http
            .put(&target.href)
            .header(header::CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::transport("file upload failed", e))?;
        ensure_success(SERVICE, response).await?;
        info!(store = SERVICE, remote_path = %remote_path, bytes = length, "uploaded photo");
        Ok(())
    }
}

/// 201 and 409 are both a usable folder; any other status is handed back.
fn interpret_create_status(path: &str, status: StatusCode) -> std::result::Result<FolderCreation, StatusCode> {
    match status {
        StatusCode::CREATED => Ok(FolderCreation::Created(YandexDisk::handle(path))),
        StatusCode::CONFLICT => Ok(FolderCreation::AlreadyExists(YandexDisk::handle(path))),
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::build_client;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn disk_for(server: &MockServer) -> anyhow::Result<YandexDisk> {
        let config = DestinationConfig {
            api_base_url: server.url("/v1/disk"),
            token: "ya-token".to_string(),
        };
        Ok(YandexDisk::new(build_client(Duration::from_secs(5))?, &config))
    }

    #[test]
    fn test_created_and_conflict_are_success() {
        let created = interpret_create_status("VK_Backup_album_7", StatusCode::CREATED);
        assert!(matches!(created, Ok(FolderCreation::Created(_))));

        let existing = interpret_create_status("VK_Backup_album_7", StatusCode::CONFLICT);
        match existing {
            Ok(FolderCreation::AlreadyExists(handle)) => {
                assert_eq!(handle.id, "VK_Backup_album_7");
                assert_eq!(handle.store, SERVICE);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_other_create_statuses_are_errors() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::INSUFFICIENT_STORAGE, StatusCode::OK] {
            assert_eq!(interpret_create_status("x", status), Err(status));
        }
    }

    #[tokio::test]
    async fn test_check_access_sends_oauth_header() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/disk").header("authorization", "OAuth ya-token");
            then.status(200).json_body(json!({ "total_space": 10, "used_space": 1 }));
        });

        disk_for(&server)?.check_access().await?;

        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_token_is_auth() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/disk");
            then.status(401).json_body(json!({ "error": "UnauthorizedError" }));
        });

        let result = disk_for(&server)?.check_access().await;

        assert!(matches!(result, Err(AppError::Auth { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_folder_maps_404_to_none() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/disk/resources")
                .query_param("path", "VK_Backup_album_7");
            then.status(404).json_body(json!({ "error": "DiskNotFoundError" }));
        });

        let found = disk_for(&server)?.find_folder("VK_Backup_album_7").await?;

        mock.assert();
        assert!(found.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_find_folder_returns_dir_and_rejects_file() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/v1/disk/resources")
                .query_param("path", "VK_Backup_album_7");
            then.status(200).json_body(json!({ "type": "dir", "path": "disk:/VK_Backup_album_7" }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/v1/disk/resources")
                .query_param("path", "notes.txt");
            then.status(200).json_body(json!({ "type": "file", "path": "disk:/notes.txt" }));
        });
        let disk = disk_for(&server)?;

        let found = disk.find_folder("VK_Backup_album_7").await?;
        assert_eq!(found.map(|h| h.id), Some("VK_Backup_album_7".to_string()));
        assert!(matches!(disk.find_folder("notes.txt").await, Err(AppError::Config(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_folder_over_http() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/disk/resources")
                .query_param("path", "new_album")
                .header("authorization", "OAuth ya-token");
            then.status(201).json_body(json!({ "href": "https://cloud-api.yandex.net/v1/disk/resources?path=new_album" }));
        });
        server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/disk/resources")
                .query_param("path", "old_album");
            then.status(409).json_body(json!({ "error": "DiskPathPointsToExistentDirectoryError" }));
        });
        server.mock(|when, then| {
            when.method(PUT)
                .path("/v1/disk/resources")
                .query_param("path", "full_album");
            then.status(507).json_body(json!({ "error": "DiskStorageQuotaExhaustedError" }));
        });
        let disk = disk_for(&server)?;

        assert!(matches!(disk.create_folder("new_album").await?, FolderCreation::Created(_)));
        assert!(matches!(disk.create_folder("old_album").await?, FolderCreation::AlreadyExists(_)));
        assert!(matches!(disk.create_folder("full_album").await, Err(AppError::Network { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_asks_for_href_then_puts_bytes() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let target = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/disk/resources/upload")
                .query_param("path", "VK_Backup_album_7/3_9.jpg")
                .query_param("overwrite", "true")
                .header("authorization", "OAuth ya-token");
            then.status(200).json_body(json!({
                "href": server.url("/upload/target-1"),
                "method": "PUT",
                "templated": false
            }));
        });
        let put = server.mock(|when, then| {
            when.method(PUT).path("/upload/target-1").body("jpeg bytes");
            then.status(201);
        });
        let dir = tempfile::tempdir()?;
        let staged = dir.path().join("3_9.jpg");
        std::fs::write(&staged, b"jpeg bytes")?;

        disk_for(&server)?
            .upload_file(&YandexDisk::handle("VK_Backup_album_7"), &staged, "3_9.jpg")
            .await?;

        target.assert();
        put.assert();
        Ok(())
    }
}
