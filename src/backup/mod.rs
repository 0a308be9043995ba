pub(crate) mod collection;
pub(crate) mod logic;
pub(crate) mod manifest;
pub(crate) mod provision;
pub(crate) mod selector;
pub(crate) mod transfer;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::destinations::{DestinationStore, GoogleDrive, YandexDisk};
use crate::source::VkClient;
use crate::utils::CallGuard;
use crate::utils::http::build_client;
use collection::{CollectionSelector, FixedSelector, InteractiveSelector};
use logic::BackupOrchestrator;
pub use logic::BackupReport;

/// Public entry point for the backup process.
/// Backs up `album_id` of `owner_id`, or asks which album when none is given.
pub async fn run_backup_flow(
    app_config: &AppConfig,
    owner_id: &str,
    album_id: Option<i64>,
    cancel: CancellationToken,
) -> Result<BackupReport> {
    let run = app_config.run.clone();
    let http = build_client(run.request_timeout).context("Failed to build HTTP client")?;

    let source = Arc::new(VkClient::new(http.clone(), &app_config.source, owner_id));
    let mut stores: Vec<Arc<dyn DestinationStore>> = Vec::new();
    if let Some(yandex) = &app_config.yandex_disk {
        stores.push(Arc::new(YandexDisk::new(http.clone(), yandex)));
    }
    if let Some(drive) = &app_config.google_drive {
        stores.push(Arc::new(GoogleDrive::new(http.clone(), drive)));
    }

    let guard = CallGuard::new(run.request_timeout, cancel);
    let orchestrator = BackupOrchestrator::new(source, stores, run, guard);

    let mut selector: Box<dyn CollectionSelector> = match album_id {
        Some(id) => Box::new(FixedSelector::new(id)),
        None => Box::new(InteractiveSelector::stdio()),
    };
    let report = orchestrator
        .run(selector.as_mut())
        .await
        .with_context(|| format!("Backup of owner {} failed", owner_id))?;
    Ok(report)
}
