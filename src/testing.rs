//! In-memory stand-ins for the photo source and the destination stores.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::destinations::{DestinationStore, FolderCreation, FolderHandle};
use crate::errors::{AppError, Result};
use crate::source::{Collection, Item, Likes, PhotoSource, SizeVariant};
use crate::utils::CallGuard;

pub fn test_guard() -> CallGuard {
    CallGuard::new(Duration::from_secs(5), CancellationToken::new())
}

pub fn collection(id: i64, title: &str) -> Collection {
    Collection {
        id,
        title: title.to_string(),
        size: None,
    }
}

/// `sizes` are `(tag, url)` pairs. URLs starting with `broken:` fail to download.
pub fn item(id: i64, likes: u64, sizes: &[(&str, &str)]) -> Item {
    Item {
        id,
        likes: Likes { count: likes },
        sizes: sizes
            .iter()
            .map(|(tag, url)| SizeVariant {
                tag: tag.to_string(),
                url: url.to_string(),
                width: None,
                height: None,
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct FakeSource {
    collections: Vec<Collection>,
    items: Vec<Item>,
    requested_counts: Mutex<Vec<u32>>,
    downloads: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeSource {
    pub fn with_album(album: Collection, items: Vec<Item>) -> Self {
        Self {
            collections: vec![album],
            items,
            ..Self::default()
        }
    }

    /// Fires `token` once `downloads` photos have been fetched.
    pub fn cancelling_after(mut self, downloads: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((downloads, token));
        self
    }

    pub fn requested_counts(&self) -> Vec<u32> {
        self.requested_counts.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoSource for FakeSource {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.collections.clone())
    }

    async fn list_items(&self, _collection: &Collection, count: u32) -> Result<Vec<Item>> {
        self.requested_counts.lock().unwrap().push(count);
        Ok(self.items.iter().take(count as usize).cloned().collect())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if url.starts_with("broken:") {
            return Err(AppError::network("photo CDN", format!("HTTP 404 for {}", url)));
        }
        let body = format!("jpeg:{}", url);
        tokio::fs::write(dest, body.as_bytes()).await?;
        let fetched = self.downloads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if fetched >= *limit {
                token.cancel();
            }
        }
        Ok(body.len() as u64)
    }
}

pub struct FakeStore {
    name: String,
    folders: Mutex<HashMap<String, String>>,
    uploads: Mutex<Vec<String>>,
    create_calls: AtomicUsize,
    hide_existing: bool,
    fail_create: bool,
    deny_access: bool,
    reject_uploads: bool,
    failing_uploads: HashSet<String>,
}

impl FakeStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            folders: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            hide_existing: false,
            fail_create: false,
            deny_access: false,
            reject_uploads: false,
            failing_uploads: HashSet::new(),
        }
    }

    /// Lookups never see folders, so creation runs into a conflict instead.
    pub fn hiding_existing_folders(mut self) -> Self {
        self.hide_existing = true;
        self
    }

    pub fn failing_folder_creation(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn denying_access(mut self) -> Self {
        self.deny_access = true;
        self
    }

    /// Every upload answers 401.
    pub fn rejecting_uploads(mut self) -> Self {
        self.reject_uploads = true;
        self
    }

    pub fn failing_uploads_of(mut self, file_name: &str) -> Self {
        self.failing_uploads.insert(file_name.to_string());
        self
    }

    pub fn seed_folder(&self, path: &str) {
        self.folders
            .lock()
            .unwrap()
            .insert(path.to_string(), format!("seeded-{}", path));
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn folder_count(&self) -> usize {
        self.folders.lock().unwrap().len()
    }

    /// `folder/file` for every upload, in arrival order.
    pub fn uploaded_files(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn handle(&self, path: &str, id: &str) -> FolderHandle {
        FolderHandle {
            store: self.name.clone(),
            path: path.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl DestinationStore for FakeStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_access(&self) -> Result<()> {
        if self.deny_access {
            return Err(AppError::auth(&self.name, "HTTP 401 Unauthorized"));
        }
        Ok(())
    }

    async fn find_folder(&self, path: &str) -> Result<Option<FolderHandle>> {
        if self.hide_existing {
            return Ok(None);
        }
        Ok(self
            .folders
            .lock()
            .unwrap()
            .get(path)
            .map(|id| self.handle(path, id)))
    }

    async fn create_folder(&self, path: &str) -> Result<FolderCreation> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create {
            return Err(AppError::network(&self.name, "HTTP 503 Service Unavailable"));
        }
        let mut folders = self.folders.lock().unwrap();
        if let Some(id) = folders.get(path) {
            return Ok(FolderCreation::AlreadyExists(self.handle(path, id)));
        }
        let id = format!("folder-{}", n);
        folders.insert(path.to_string(), id.clone());
        Ok(FolderCreation::Created(self.handle(path, &id)))
    }

    async fn upload_file(&self, folder: &FolderHandle, local_path: &Path, file_name: &str) -> Result<()> {
        // The staged file must still be there while uploads run.
        tokio::fs::metadata(local_path).await?;
        if self.reject_uploads {
            return Err(AppError::auth(&self.name, "HTTP 401 Unauthorized"));
        }
        if self.failing_uploads.contains(file_name) {
            return Err(AppError::network(&self.name, "HTTP 500 Internal Server Error"));
        }
        self.uploads
            .lock()
            .unwrap()
            .push(format!("{}/{}", folder.path, file_name));
        Ok(())
    }
}
