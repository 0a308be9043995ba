// photobackup/src/backup/selector.rs
use serde::Deserialize;

use crate::errors::{AppError, Result};
use crate::source::SizeVariant;

/// Size tags the photo provider emits, smallest to largest.
pub const KNOWN_SIZE_TAGS: &[&str] = &["s", "m", "x", "o", "p", "q", "r", "y", "z", "w"];

fn default_first_match_only() -> bool {
    true
}

/// One tier of the preference list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SizeRule {
    pub tag: String,
    /// Take only the first variant with this tag instead of every one.
    #[serde(default = "default_first_match_only")]
    pub first_match_only: bool,
}

impl SizeRule {
    pub fn first(tag: &str) -> Self {
        Self { tag: tag.to_string(), first_match_only: true }
    }

    pub fn all(tag: &str) -> Self {
        Self { tag: tag.to_string(), first_match_only: false }
    }
}

/// Ordered preference of size tiers. The first tier present in a photo's
/// variant list decides the selection; lower tiers are never looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePolicy {
    rules: Vec<SizeRule>,
}

impl Default for SizePolicy {
    /// `w` stops at the first hit, `z` takes every hit.
    fn default() -> Self {
        Self { rules: vec![SizeRule::first("w"), SizeRule::all("z")] }
    }
}

impl SizePolicy {
    pub fn new(rules: Vec<SizeRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(AppError::Config("size preference list cannot be empty".to_string()));
        }
        for rule in &rules {
            if !KNOWN_SIZE_TAGS.contains(&rule.tag.as_str()) {
                return Err(AppError::Config(format!(
                    "unknown size tag '{}' in size preference (known: {})",
                    rule.tag,
                    KNOWN_SIZE_TAGS.join(", ")
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[SizeRule] {
        &self.rules
    }

    /// Picks the variants to back up, preserving their order in `variants`.
    pub fn select<'a>(&self, variants: &'a [SizeVariant]) -> Vec<&'a SizeVariant> {
        for rule in &self.rules {
            let mut matching = variants.iter().filter(|v| v.tag == rule.tag);
            if rule.first_match_only {
                if let Some(found) = matching.next() {
                    return vec![found];
                }
            } else {
                let found: Vec<&SizeVariant> = matching.collect();
                if !found.is_empty() {
                    return found;
                }
            }
        }
        Vec::new()
    }
}
