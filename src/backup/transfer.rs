// photobackup/src/backup/transfer.rs
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::destinations::{DestinationStore, FolderHandle};
use crate::errors::Result;
use crate::source::{Item, PhotoSource, SizeVariant};
use crate::utils::CallGuard;

/// One manifest entry: which file was backed up and at which size tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub file_name: String,
    pub size: String,
}

/// Stands in for a record when a photo could not be backed up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub item_id: i64,
    pub file_name: String,
    pub error: String,
}

/// A store together with the folder provisioned on it for this run.
#[derive(Clone)]
pub struct ProvisionedDestination {
    pub store: Arc<dyn DestinationStore>,
    pub folder: FolderHandle,
}

/// Stages one photo variant locally and pushes it to every destination.
pub struct PhotoTransferUnit<'a> {
    source: &'a dyn PhotoSource,
    staging_dir: &'a Path,
    guard: &'a CallGuard,
}

impl<'a> PhotoTransferUnit<'a> {
    pub fn new(source: &'a dyn PhotoSource, staging_dir: &'a Path, guard: &'a CallGuard) -> Self {
        Self {
            source,
            staging_dir,
            guard,
        }
    }

    /// Downloads `variant`, uploads it to each destination and returns its
    /// record. The staged file is removed whatever the outcome.
    pub async fn transfer(
        &self,
        item: &Item,
        variant: &SizeVariant,
        destinations: &[ProvisionedDestination],
    ) -> Result<TransferRecord> {
        let file_name = item.file_name();
        let staged = self.staging_dir.join(&file_name);

        let outcome = self.stage_and_push(&staged, &file_name, variant, destinations).await;
        discard_staged(&staged).await;

        outcome.map(|_| TransferRecord {
            file_name,
            size: variant.tag.clone(),
        })
    }

    async fn stage_and_push(
        &self,
        staged: &Path,
        file_name: &str,
        variant: &SizeVariant,
        destinations: &[ProvisionedDestination],
    ) -> Result<()> {
        let bytes = self
            .guard
            .run("photo download", self.source.download(&variant.url, staged))
            .await?;
        info!(
            file = file_name,
            size = %variant.tag,
            width = ?variant.width,
            height = ?variant.height,
            bytes,
            "photo staged for upload"
        );

        for destination in destinations {
            let store = destination.store.as_ref();
            self.guard
                .run(store.name(), store.upload_file(&destination.folder, staged, file_name))
                .await?;
            debug!(file = file_name, store = %destination.folder.store, folder = %destination.folder.path, "upload finished");
        }
        Ok(())
    }
}

async fn discard_staged(staged: &Path) {
    match tokio::fs::remove_file(staged).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %staged.display(), error = %e, "could not remove staged photo"),
    }
}
