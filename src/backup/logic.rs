// photobackup/src/backup/logic.rs
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{Builder as TempFileBuilder, TempDir};
use tracing::{debug, info, warn};

use super::collection::CollectionSelector;
use super::manifest::BackupManifestWriter;
use super::provision::FolderProvisioner;
use super::transfer::{PhotoTransferUnit, ProvisionedDestination, TransferFailure, TransferRecord};
use crate::config::RunConfig;
use crate::destinations::DestinationStore;
use crate::errors::{AppError, Result};
use crate::source::{Collection, Item, PhotoSource};
use crate::utils::CallGuard;

const SOURCE_SERVICE: &str = "VK";

/// How a backup run ended.
#[derive(Debug)]
pub enum BackupReport {
    /// The owner had no album to back up; nothing was touched.
    NoCollection,
    Completed(RunSummary),
}

#[derive(Debug)]
pub struct RunSummary {
    pub collection: Collection,
    pub destinations: Vec<String>,
    pub items_fetched: usize,
    pub records: Vec<TransferRecord>,
    pub failures: Vec<TransferFailure>,
    pub skipped_items: usize,
    pub manifest_path: PathBuf,
    pub cancelled: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunSummary {
    /// Ids of the photos with at least one failed transfer, in run order.
    pub fn failed_item_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::new();
        for failure in &self.failures {
            if !ids.contains(&failure.item_id) {
                ids.push(failure.item_id);
            }
        }
        ids
    }
}

impl BackupReport {
    /// True when nothing failed and the run was not interrupted.
    pub fn is_clean(&self) -> bool {
        match self {
            BackupReport::NoCollection => true,
            BackupReport::Completed(summary) => summary.failures.is_empty() && !summary.cancelled,
        }
    }

    pub fn print_summary(&self) {
        let summary = match self {
            BackupReport::NoCollection => {
                println!("ℹ️  No albums available for backup.");
                return;
            }
            BackupReport::Completed(summary) => summary,
        };
        println!(
            "📦 Album '{}' (id: {}): {} of {} photo(s) backed up to {}",
            summary.collection.title,
            summary.collection.id,
            summary.records.len(),
            summary.items_fetched,
            summary.destinations.join(", ")
        );
        if summary.skipped_items > 0 {
            println!("⏭  {} photo(s) had no size matching the preference list", summary.skipped_items);
        }
        if !summary.failures.is_empty() {
            let ids: Vec<String> = summary.failed_item_ids().iter().map(|id| id.to_string()).collect();
            println!("❌ Failed photo ids: {}", ids.join(", "));
            for failure in &summary.failures {
                println!("   {} ({}): {}", failure.item_id, failure.file_name, failure.error);
            }
        }
        if summary.cancelled {
            println!("🛑 Run was cancelled before all photos were processed");
        }
        println!("📝 Manifest: {}", summary.manifest_path.display());
        println!(
            "⏱  Took {:.1}s",
            (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0
        );
    }
}

#[derive(Debug, Default)]
struct ItemOutcome {
    records: Vec<TransferRecord>,
    failures: Vec<TransferFailure>,
    skipped: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct LoopTotals {
    records: Vec<TransferRecord>,
    failures: Vec<TransferFailure>,
    skipped_items: usize,
    cancelled: bool,
}

/// Drives one backup run from album selection to the written manifest.
pub struct BackupOrchestrator {
    source: Arc<dyn PhotoSource>,
    stores: Vec<Arc<dyn DestinationStore>>,
    run: RunConfig,
    guard: CallGuard,
}

impl BackupOrchestrator {
    pub fn new(
        source: Arc<dyn PhotoSource>,
        stores: Vec<Arc<dyn DestinationStore>>,
        run: RunConfig,
        guard: CallGuard,
    ) -> Self {
        Self {
            source,
            stores,
            run,
            guard,
        }
    }

    /// Runs the whole backup:
    /// 1. Lists the owner's albums and lets `selector` pick one.
    /// 2. Checks every destination's credentials.
    /// 3. Provisions the album folder on every destination.
    /// 4. Fetches up to `photo_count` photos.
    /// 5. Transfers the selected size variants of each photo.
    /// 6. Writes the manifest.
    pub async fn run(&self, selector: &mut dyn CollectionSelector) -> Result<BackupReport> {
        let started_at = Local::now();

        let collections = self
            .guard
            .run(SOURCE_SERVICE, self.source.list_collections())
            .await?;
        if collections.is_empty() {
            info!("owner has no albums; nothing to back up");
            return Ok(BackupReport::NoCollection);
        }
        let Some(collection) = selector.select(&collections)? else {
            info!("no album selected; nothing to back up");
            return Ok(BackupReport::NoCollection);
        };
        info!(album_id = collection.id, title = %collection.title, "album selected");

        self.authenticate().await?;

        let folder_path = format!("{}{}", self.run.folder_prefix, collection.id);
        let destinations = self.provision(&folder_path).await?;

        let items = self
            .guard
            .run(SOURCE_SERVICE, self.source.list_items(&collection, self.run.photo_count))
            .await?;
        info!(count = items.len(), limit = self.run.photo_count, "fetched photo list");
        debug!(rules = ?self.run.size_policy.rules(), "size preference");

        let staging = create_staging_dir(self.run.staging_root.as_deref())?;
        let totals = self.transfer_items(&items, &destinations, staging.path()).await;
        if let Err(e) = staging.close() {
            warn!(error = %e, "could not remove staging directory");
        }
        let totals = totals?;

        let manifest_path = BackupManifestWriter::new(&self.run.manifest_dir)
            .finalize(collection.id, &totals.records)?;

        Ok(BackupReport::Completed(RunSummary {
            collection,
            destinations: destinations
                .iter()
                .map(|d| d.store.name().to_string())
                .collect(),
            items_fetched: items.len(),
            records: totals.records,
            failures: totals.failures,
            skipped_items: totals.skipped_items,
            manifest_path,
            cancelled: totals.cancelled,
            started_at,
            finished_at: Local::now(),
        }))
    }

    async fn authenticate(&self) -> Result<()> {
        for store in &self.stores {
            self.guard.run(store.name(), store.check_access()).await?;
            info!(store = store.name(), "credentials accepted");
        }
        Ok(())
    }

    /// Provisions every store even when an earlier one fails. Stores that
    /// could not be provisioned are left out of the run unless the failure
    /// is fatal or no store is left.
    async fn provision(&self, folder_path: &str) -> Result<Vec<ProvisionedDestination>> {
        let mut provisioner = FolderProvisioner::new(self.guard.clone());
        let mut ready = Vec::new();
        let mut fatal = None;
        let mut last_error = None;

        for store in &self.stores {
            match provisioner.ensure_folder(store.as_ref(), folder_path).await {
                Ok(folder) => ready.push(ProvisionedDestination {
                    store: Arc::clone(store),
                    folder,
                }),
                Err(e @ (AppError::Auth { .. } | AppError::Cancelled(_))) => {
                    warn!(store = store.name(), error = %e, "folder provisioning failed");
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    warn!(store = store.name(), error = %e, "folder provisioning failed; leaving store out of this run");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        match last_error {
            Some(e) if ready.is_empty() => Err(e),
            _ => Ok(ready),
        }
    }

    async fn transfer_items(
        &self,
        items: &[Item],
        destinations: &[ProvisionedDestination],
        staging_dir: &Path,
    ) -> Result<LoopTotals> {
        let unit = PhotoTransferUnit::new(self.source.as_ref(), staging_dir, &self.guard);
        let unit = &unit;
        let total = items.len();

        // `buffered` keeps results in item order whatever the concurrency.
        let mut outcomes = stream::iter(items.iter().enumerate())
            .map(move |(index, item)| self.process_item(unit, index + 1, total, item, destinations))
            .buffered(self.run.max_concurrent_transfers);

        let mut totals = LoopTotals::default();
        while let Some(outcome) = outcomes.next().await {
            let outcome = outcome?;
            totals.records.extend(outcome.records);
            totals.failures.extend(outcome.failures);
            if outcome.skipped {
                totals.skipped_items += 1;
            }
            totals.cancelled |= outcome.cancelled;
        }
        Ok(totals)
    }

    async fn process_item(
        &self,
        unit: &PhotoTransferUnit<'_>,
        position: usize,
        total: usize,
        item: &Item,
        destinations: &[ProvisionedDestination],
    ) -> Result<ItemOutcome> {
        let mut outcome = ItemOutcome::default();
        if self.guard.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
        }

        let selected = self.run.size_policy.select(&item.sizes);
        if selected.is_empty() {
            outcome.skipped = true;
            info!(position, total, photo_id = item.id, "no size matches the preference list; skipped");
            return Ok(outcome);
        }

        for variant in selected {
            match unit.transfer(item, variant, destinations).await {
                Ok(record) => outcome.records.push(record),
                Err(AppError::Cancelled(reason)) => {
                    warn!(photo_id = item.id, reason = %reason, "transfer interrupted");
                    outcome.cancelled = true;
                    break;
                }
                Err(e) if e.is_item_recoverable() => {
                    warn!(photo_id = item.id, error = %e, "transfer failed; continuing with the next photo");
                    outcome.failures.push(TransferFailure {
                        item_id: item.id,
                        file_name: item.file_name(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            position,
            total,
            photo_id = item.id,
            backed_up = outcome.records.len(),
            failed = outcome.failures.len(),
            "photo processed"
        );
        Ok(outcome)
    }
}

fn create_staging_dir(root: Option<&Path>) -> Result<TempDir> {
    let mut builder = TempFileBuilder::new();
    builder.prefix("photobackup_");
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    info!(path = %dir.path().display(), "staging directory ready");
    Ok(dir)
}
