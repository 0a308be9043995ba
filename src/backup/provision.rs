// photobackup/src/backup/provision.rs
use std::collections::HashMap;
use tracing::info;

use crate::destinations::{DestinationStore, FolderCreation, FolderHandle};
use crate::errors::Result;
use crate::utils::CallGuard;

/// Makes sure destination folders exist, creating each at most once per run.
pub struct FolderProvisioner {
    guard: CallGuard,
    handles: HashMap<(String, String), FolderHandle>,
}

impl FolderProvisioner {
    pub fn new(guard: CallGuard) -> Self {
        Self {
            guard,
            handles: HashMap::new(),
        }
    }

    /// Returns the handle of `path` on `store`, reusing an existing folder
    /// and only creating one when the store has none.
    pub async fn ensure_folder(&mut self, store: &dyn DestinationStore, path: &str) -> Result<FolderHandle> {
        let key = (store.name().to_string(), path.to_string());
        if let Some(handle) = self.handles.get(&key) {
            return Ok(handle.clone());
        }

        let handle = match self.guard.run(store.name(), store.find_folder(path)).await? {
            Some(existing) => {
                info!(store = store.name(), folder = path, "reusing existing folder");
                existing
            }
            None => {
                let creation = self.guard.run(store.name(), store.create_folder(path)).await?;
                let created = matches!(creation, FolderCreation::Created(_));
                info!(store = store.name(), folder = path, created, "folder provisioned");
                creation.into_handle()
            }
        };

        self.handles.insert(key, handle.clone());
        Ok(handle)
    }
}
