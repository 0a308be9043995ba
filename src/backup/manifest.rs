// photobackup/src/backup/manifest.rs
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use super::transfer::TransferRecord;
use crate::errors::Result;

/// Writes the per-run list of backed-up files, once, at the end of the run.
pub struct BackupManifestWriter {
    dir: PathBuf,
}

impl BackupManifestWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn manifest_path(&self, collection_id: i64) -> PathBuf {
        self.dir.join(format!("{}_photos.json", collection_id))
    }

    /// Serializes `records` to `{collection_id}_photos.json`, replacing any
    /// manifest an earlier run left there.
    pub fn finalize(&self, collection_id: i64, records: &[TransferRecord]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.manifest_path(collection_id);

        // Written beside the target and renamed so a crash never leaves half a manifest.
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(&encode(records)?)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| e.error)?;

        info!(path = %path.display(), entries = records.len(), "manifest written");
        Ok(path)
    }
}

fn encode(records: &[TransferRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, LegacyFormatter);
    records.serialize(&mut serializer)?;
    Ok(buf)
}

/// Matches the layout of manifests produced by earlier versions of the tool:
/// `", "` between items, `": "` after keys, non-ASCII as `\uXXXX`.
struct LegacyFormatter;

impl Formatter for LegacyFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}
