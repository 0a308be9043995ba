// photobackup/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::backup::selector::{SizePolicy, SizeRule};
use crate::errors::AppError;

pub const DEFAULT_VK_API_BASE: &str = "https://api.vk.com/method";
pub const DEFAULT_VK_API_VERSION: &str = "5.131";
pub const DEFAULT_YANDEX_API_BASE: &str = "https://cloud-api.yandex.net/v1/disk";
pub const DEFAULT_GDRIVE_API_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_PHOTO_COUNT: u32 = 5;
pub const MAX_PHOTO_COUNT: u32 = 1000;
pub const DEFAULT_FOLDER_PREFIX: &str = "VK_Backup_album_";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonSourceConfig {
    pub api_base_url: Option<String>,
    pub api_version: Option<String>,
    pub token: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonDestinationConfig {
    pub enabled: Option<bool>,
    pub api_base_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub source: Option<JsonSourceConfig>,
    pub yandex_disk: Option<JsonDestinationConfig>,
    pub google_drive: Option<JsonDestinationConfig>,
    pub photo_count: Option<u32>,
    pub size_preference: Option<serde_json::Value>,
    pub folder_prefix: Option<String>,
    pub manifest_dir: Option<PathBuf>,
    pub staging_root: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub max_concurrent_transfers: Option<usize>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub api_base_url: String,
    pub api_version: String,
    pub token: String,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub api_base_url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub photo_count: u32,
    pub size_policy: SizePolicy,
    pub folder_prefix: String,
    pub manifest_dir: PathBuf,
    pub staging_root: Option<PathBuf>,
    pub request_timeout: Duration,
    pub max_concurrent_transfers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            photo_count: DEFAULT_PHOTO_COUNT,
            size_policy: SizePolicy::default(),
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            manifest_dir: PathBuf::from("."),
            staging_root: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent_transfers: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub yandex_disk: Option<DestinationConfig>,
    pub google_drive: Option<DestinationConfig>,
    pub run: RunConfig,
}

impl AppConfig {
    /// Loads `config_path` when it exists and layers environment overrides on top.
    /// `lookup` resolves environment variables so tests can inject their own.
    pub fn load<F>(config_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = if config_path.exists() {
            let config_content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
            serde_json::from_str(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?
        } else {
            RawJsonConfig::default()
        };
        Self::from_raw(&raw, lookup)
    }

    pub fn from_raw<F>(raw: &RawJsonConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source_raw = raw.source.clone().unwrap_or_default();
        let source = SourceConfig {
            api_base_url: checked_base_url(
                "source.api_base_url",
                source_raw.api_base_url.as_deref().unwrap_or(DEFAULT_VK_API_BASE),
            )?,
            api_version: source_raw.api_version.unwrap_or_else(|| DEFAULT_VK_API_VERSION.to_string()),
            token: env("VK_TOKEN")
                .or(source_raw.token.filter(|s| !s.is_empty()))
                .ok_or_else(|| AppError::auth("VK", "VK_TOKEN is not set and config.json has no source.token"))?,
            owner_id: env("PHOTOBACKUP_OWNER_ID").or(source_raw.owner_id.filter(|s| !s.is_empty())),
        };

        let yandex_disk = resolve_destination(
            "Yandex Disk",
            raw.yandex_disk.as_ref(),
            env("YANDEX_TOKEN"),
            DEFAULT_YANDEX_API_BASE,
        )?;
        let google_drive = resolve_destination(
            "Google Drive",
            raw.google_drive.as_ref(),
            env("GDRIVE_TOKEN"),
            DEFAULT_GDRIVE_API_BASE,
        )?;
        if yandex_disk.is_none() && google_drive.is_none() {
            return Err(AppError::Config("at least one destination must be enabled".to_string()).into());
        }

        let photo_count = match env("PHOTOBACKUP_PHOTO_COUNT") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("PHOTOBACKUP_PHOTO_COUNT is not a number: {}", value))?,
            None => raw.photo_count.unwrap_or(DEFAULT_PHOTO_COUNT),
        };
        if photo_count == 0 || photo_count > MAX_PHOTO_COUNT {
            return Err(AppError::Config(format!(
                "photo_count must be between 1 and {}, got {}",
                MAX_PHOTO_COUNT, photo_count
            ))
            .into());
        }

        let size_policy = match &raw.size_preference {
            Some(value) => SizePolicy::new(parse_size_preference(value)?)?,
            None => SizePolicy::default(),
        };

        let request_timeout_secs = raw.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(AppError::Config("request_timeout_secs must be at least 1".to_string()).into());
        }
        let max_concurrent_transfers = raw.max_concurrent_transfers.unwrap_or(1);
        if max_concurrent_transfers == 0 {
            return Err(AppError::Config("max_concurrent_transfers must be at least 1".to_string()).into());
        }

        let run = RunConfig {
            photo_count,
            size_policy,
            folder_prefix: raw
                .folder_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_FOLDER_PREFIX.to_string()),
            manifest_dir: env("PHOTOBACKUP_MANIFEST_DIR")
                .map(PathBuf::from)
                .or_else(|| raw.manifest_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            staging_root: env("PHOTOBACKUP_STAGING_DIR")
                .map(PathBuf::from)
                .or_else(|| raw.staging_root.clone()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_concurrent_transfers,
        };

        Ok(AppConfig {
            source,
            yandex_disk,
            google_drive,
            run,
        })
    }
}

/// A destination is on unless explicitly disabled; when on, it needs a token.
fn resolve_destination(
    service: &str,
    raw: Option<&JsonDestinationConfig>,
    env_token: Option<String>,
    default_base: &str,
) -> Result<Option<DestinationConfig>> {
    let raw = raw.cloned().unwrap_or_default();
    if !raw.enabled.unwrap_or(true) {
        return Ok(None);
    }
    let token = env_token
        .or(raw.token.filter(|s| !s.is_empty()))
        .ok_or_else(|| AppError::auth(service, "no token configured for an enabled destination"))?;
    Ok(Some(DestinationConfig {
        api_base_url: checked_base_url(service, raw.api_base_url.as_deref().unwrap_or(default_base))?,
        token,
    }))
}

/// Base URLs must be absolute http(s) URLs; the trailing slash is dropped.
fn checked_base_url(field: &str, value: &str) -> Result<String> {
    let parsed = Url::parse(value)
        .map_err(|e| AppError::Config(format!("{} base URL '{}' is invalid: {}", field, value, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Config(format!("{} base URL '{}' must use http or https", field, value)).into());
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Parses `size_preference`.
/// Accepts either tags (`["w", "+z"]`, where `+` takes every match) or
/// rule objects (`[{"tag": "w", "first_match_only": true}]`).
fn parse_size_preference(value: &serde_json::Value) -> Result<Vec<SizeRule>> {
    let entries = value
        .as_array()
        .context("size_preference must be an array")?;
    entries
        .iter()
        .map(|entry| {
            if let Some(tag) = entry.as_str() {
                Ok(match tag.strip_prefix('+') {
                    Some(all) => SizeRule::all(all),
                    None => SizeRule::first(tag),
                })
            } else if entry.is_object() {
                serde_json::from_value(entry.clone())
                    .context("Failed to parse size_preference rule object")
            } else {
                Err(anyhow::anyhow!(
                    "size_preference entries must be tag strings or rule objects"
                ))
            }
        })
        .collect()
}
