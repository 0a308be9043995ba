//! Photo collection provider: album listing and photo metadata.

pub(crate) mod vk;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use crate::errors::Result;

pub use vk::VkClient;

/// A source album the owner can back up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub title: String,
    /// Number of photos, when the provider reports it.
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Likes {
    pub count: u64,
}

/// One rendition of a photo.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SizeVariant {
    #[serde(rename = "type")]
    pub tag: String,
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A single photo of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub id: i64,
    #[serde(default)]
    pub likes: Likes,
    #[serde(default)]
    pub sizes: Vec<SizeVariant>,
}

impl Item {
    /// Name of the staged and uploaded file: `{likes}_{id}.jpg`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.jpg", self.likes.count, self.id)
    }
}

#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Every album of the owner, system albums included.
    async fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Up to `count` photos of `collection`, in provider order.
    async fn list_items(&self, collection: &Collection, count: u32) -> Result<Vec<Item>>;

    /// Writes the bytes behind `url` to `dest`, returning how many were written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}
