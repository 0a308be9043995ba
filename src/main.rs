//! VK album photo backup tool
//!
//! Copies the photos of one VK album to Yandex Disk and Google Drive and
//! records what was copied in a JSON manifest.

// photobackup/src/main.rs
mod backup;
mod config;
mod destinations;
mod errors;
mod source;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use config::AppConfig;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Main entry point. Usage: `photobackup [owner_id] [album_id]`.
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("photobackup=info")))
        .with_writer(std::io::stderr)
        .init();

    match run_app().await {
        Ok(true) => {
            println!("✅ Backup completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("⚠️  Backup finished with failures.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run was clean.
async fn run_app() -> Result<bool> {
    dotenv::dotenv().ok();

    let config_path = env::var("PHOTOBACKUP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let app_config = AppConfig::load(&config_path, |key| env::var(key).ok())
        .with_context(|| format!("Failed to load application configuration from {}", config_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let owner_id = match args.get(1) {
        Some(arg) => arg.trim().to_string(),
        None => match &app_config.source.owner_id {
            Some(id) => id.clone(),
            None => prompt_owner_id()?,
        },
    };
    if owner_id.is_empty() {
        anyhow::bail!("No VK owner id given");
    }
    let album_id = args
        .get(2)
        .map(|arg| arg.trim().parse::<i64>())
        .transpose()
        .context("Album id must be an integer")?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current photos and writing the manifest");
            ctrl_c_token.cancel();
        }
    });

    println!("🚀 Starting backup for VK owner {}...", owner_id);
    let report = backup::run_backup_flow(&app_config, &owner_id, album_id, cancel).await?;
    report.print_summary();
    Ok(report.is_clean())
}

/// Asks for the VK user id whose albums should be backed up.
fn prompt_owner_id() -> Result<String> {
    use std::io::{stdin, stdout, Write};

    print!("Enter the VK user id: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
