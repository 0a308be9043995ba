// photobackup/src/source/vk.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Collection, Item, PhotoSource};
use crate::config::SourceConfig;
use crate::errors::{AppError, Result};
use crate::utils::http::ensure_success;

const SERVICE: &str = "VK";
const CDN: &str = "photo CDN";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    items: Vec<T>,
}

/// VK photos API client bound to one album owner.
pub struct VkClient {
    http: Client,
    base_url: String,
    api_version: String,
    token: String,
    owner_id: String,
}

impl VkClient {
    pub fn new(http: Client, config: &SourceConfig, owner_id: &str) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token: config.token.clone(),
            owner_id: owner_id.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        debug!(method, owner_id = %self.owner_id, "calling VK API");
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, method))
            .query(params)
            .query(&[("access_token", self.token.as_str()), ("v", self.api_version.as_str())])
            .send()
            .await
            .map_err(|e| AppError::network(SERVICE, format!("{} request failed: {}", method, e)))?;
        let response = ensure_success(SERVICE, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| AppError::network(SERVICE, format!("{} body unreadable: {}", method, e)))?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        open_envelope(method, envelope)
    }
}

#[async_trait]
impl PhotoSource for VkClient {
    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let list: ItemList<Collection> = self
            .call(
                "photos.getAlbums",
                &[("owner_id", self.owner_id.clone()), ("need_system", "1".to_string())],
            )
            .await?;
        Ok(list.items)
    }

    async fn list_items(&self, collection: &Collection, count: u32) -> Result<Vec<Item>> {
        let list: ItemList<Item> = self
            .call(
                "photos.get",
                &[
                    ("owner_id", self.owner_id.clone()),
                    ("album_id", album_param(collection.id)),
                    ("extended", "1".to_string()),
                    ("photo_sizes", "1".to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;
        Ok(list.items)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        // Photo URLs are pre-signed CDN links and take no token.
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::network(CDN, format!("download request failed: {}", e)))?;
        // Any refusal here concerns this one link, never the VK token.
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(CDN, format!("HTTP {} for {}", status, url)));
        }

        let mut output_file = File::create(dest).await?;
        let mut total_bytes_downloaded: u64 = 0;
        while let Some(bytes_chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::network(CDN, format!("download interrupted: {}", e)))?
        {
            output_file.write_all(&bytes_chunk).await?;
            total_bytes_downloaded += bytes_chunk.len() as u64;
        }
        output_file.flush().await?;
        Ok(total_bytes_downloaded)
    }
}

/// System albums are listed with negative ids but fetched by name.
fn album_param(album_id: i64) -> String {
    match album_id {
        -6 => "profile".to_string(),
        -7 => "wall".to_string(),
        -15 => "saved".to_string(),
        id => id.to_string(),
    }
}

fn open_envelope<T>(method: &str, envelope: Envelope<T>) -> Result<T> {
    if let Some(err) = envelope.error {
        return Err(classify_api_error(method, err));
    }
    envelope
        .response
        .ok_or_else(|| AppError::network(SERVICE, format!("{} returned neither response nor error", method)))
}

fn classify_api_error(method: &str, err: ApiError) -> AppError {
    let message = format!("{} failed with code {}: {}", method, err.error_code, err.error_msg);
    match err.error_code {
        // authorization failed, access denied, private profile, album access denied
        5 | 15 | 30 | 200 => AppError::auth(SERVICE, message),
        // invalid parameter, invalid user id
        100 | 113 => AppError::NotFound(message),
        _ => AppError::network(SERVICE, message),
    }
}
