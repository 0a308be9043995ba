//! Remote stores that receive the backed-up photos.

pub(crate) mod gdrive;
pub(crate) mod yandex;

use async_trait::async_trait;
use reqwest::Body;
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::errors::Result;

pub use gdrive::GoogleDrive;
pub use yandex::YandexDisk;

/// A provisioned folder on one store. `id` is whatever the store needs to
/// place files into it (a path on Yandex Disk, a file id on Google Drive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub store: String,
    pub path: String,
    pub id: String,
}

/// Outcome of a folder creation call. A conflict means someone else created
/// the folder first and is as good as creating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderCreation {
    Created(FolderHandle),
    AlreadyExists(FolderHandle),
}

impl FolderCreation {
    pub fn into_handle(self) -> FolderHandle {
        match self {
            FolderCreation::Created(handle) | FolderCreation::AlreadyExists(handle) => handle,
        }
    }
}

#[async_trait]
pub trait DestinationStore: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap authenticated read used to reject bad credentials before any write.
    async fn check_access(&self) -> Result<()>;

    async fn find_folder(&self, path: &str) -> Result<Option<FolderHandle>>;

    async fn create_folder(&self, path: &str) -> Result<FolderCreation>;

    /// Places the local file into `folder` under `file_name`.
    async fn upload_file(&self, folder: &FolderHandle, local_path: &Path, file_name: &str) -> Result<()>;
}

/// Streams a staged file as a request body, returning it with its length.
pub(crate) async fn file_body(local_path: &Path) -> Result<(Body, u64)> {
    let file = File::open(local_path).await?;
    let length = file.metadata().await?.len();
    Ok((Body::wrap_stream(ReaderStream::new(file)), length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_outcomes_share_handle() {
        let handle = FolderHandle {
            store: "Yandex Disk".into(),
            path: "VK_Backup_album_1".into(),
            id: "VK_Backup_album_1".into(),
        };
        assert_eq!(FolderCreation::Created(handle.clone()).into_handle(), handle);
        assert_eq!(FolderCreation::AlreadyExists(handle.clone()).into_handle(), handle);
    }

    #[tokio::test]
    async fn test_file_body_reports_length() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("3_9.jpg");
        tokio::fs::write(&path, b"jpeg bytes").await?;
        let (_body, length) = file_body(&path).await?;
        assert_eq!(length, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_body_missing_file_is_local_io() {
        let result = file_body(Path::new("/nonexistent/staging/0_0.jpg")).await;
        assert!(matches!(result, Err(crate::errors::AppError::LocalIo(_))));
    }
}
