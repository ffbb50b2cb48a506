// # File Store
//
// File-based implementation of DestinationStore and MatchingStore with
// crash recovery.
//
// ## Purpose
//
// Keeps both collections in a single JSON document so a standalone daemon
// survives restarts without a database.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "destinations": {
//     "d1": { "id": "d1", "owner": "u1", "location": { "country": "US", "region": "any", "city": "any" } }
//   },
//   "matchings": {
//     "d1": { "destination": { ... }, "matched": [ ... ] }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use super::memory::{add_to_set, insert_if_absent, pull};
use crate::Error;
use crate::model::{Destination, DestinationId, Matching};
use crate::traits::{DestinationStore, InsertResult, MatchingStore, OverlapQuery, SetUpdate};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based store with crash recovery
///
/// Every mutation that changes state is written to disk before the call
/// returns. Writes are serialised and each write snapshots the state after
/// acquiring the write slot, so the file never regresses to an older state
/// under concurrent updates.
///
/// # Example
///
/// ```rust,no_run
/// use matcher_core::store::FileStore;
/// use matcher_core::traits::MatchingStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/matcher/store.json").await?;
///     let records = store.list().await?;
///     println!("{} matching records", records.len());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    write_slot: Mutex<()>,
}

/// Internal state for file-based store
#[derive(Debug, Default)]
struct FileState {
    destinations: BTreeMap<DestinationId, Destination>,
    matchings: BTreeMap<DestinationId, Matching>,
    dirty: bool,
}

/// Serializable store file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(default)]
    destinations: BTreeMap<DestinationId, Destination>,
    #[serde(default)]
    matchings: BTreeMap<DestinationId, Matching>,
}

impl FileStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load existing store file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.inspect_err(|e| {
                tracing::error!("Failed to create store directory {}: {}", parent.display(), e)
            })?;
        }

        let file = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                destinations: file.destinations,
                matchings: file.matchings,
                dirty: false,
            })),
            write_slot: Mutex::new(()),
        })
    }

    /// Load the store file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main store file
    /// 2. If JSON parse error, try loading backup
    /// 3. If backup also fails, start with empty state
    async fn load_with_recovery(path: &Path) -> Result<StoreFileFormat, Error> {
        match Self::load(path).await {
            Ok(file) => {
                tracing::debug!(
                    "Loaded store file: {} destinations, {} matchings",
                    file.destinations.len(),
                    file.matchings.len()
                );
                Ok(file)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Store file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(Self::empty_file());
                }

                match Self::load(&backup_path).await {
                    Ok(file) => {
                        tracing::info!(
                            "Recovered store from backup: {} destinations, {} matchings",
                            file.destinations.len(),
                            file.matchings.len()
                        );

                        if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await
                        {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(file)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(Self::empty_file())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the store file; a missing file is an empty store
    async fn load(path: &Path) -> Result<StoreFileFormat, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(Self::empty_file());
        }

        let content = fs::read_to_string(path).await.inspect_err(|e| {
            tracing::error!("Failed to read store file {}: {}", path.display(), e)
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file)
    }

    fn empty_file() -> StoreFileFormat {
        StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            destinations: BTreeMap::new(),
            matchings: BTreeMap::new(),
        }
    }

    /// Write the current state to disk atomically
    async fn write_state(&self) -> Result<(), Error> {
        let _slot = self.write_slot.lock().await;

        let json = {
            let state_guard = self.state.read().await;
            let file = StoreFileFormat {
                version: STORE_FILE_VERSION.to_string(),
                destinations: state_guard.destinations.clone(),
                matchings: state_guard.matchings.clone(),
            };
            serde_json::to_string_pretty(&file)?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.inspect_err(|e| {
                tracing::error!("Failed to create temp file {}: {}", temp_path.display(), e)
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.inspect_err(|e| {
            tracing::error!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )
        })?;

        self.state.write().await.dirty = false;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore store file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await?;

        tracing::info!("Restored store file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Insert or replace a destination record
    ///
    /// Destinations belong to another service; this exists for seeding and
    /// for embedding the matcher next to that service.
    pub async fn put_destination(&self, destination: Destination) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .destinations
                .insert(destination.id.clone(), destination);
            state_guard.dirty = true;
        }
        self.write_state().await
    }

    /// Remove a destination record, returning whether it existed
    pub async fn remove_destination(&self, id: &DestinationId) -> Result<bool, Error> {
        let removed = {
            let mut state_guard = self.state.write().await;
            let removed = state_guard.destinations.remove(id).is_some();
            state_guard.dirty |= removed;
            removed
        };
        if removed {
            self.write_state().await?;
        }
        Ok(removed)
    }

    /// Persist after a mutation, only if it changed something
    async fn persist_if(&self, changed: bool) -> Result<(), Error> {
        if changed {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DestinationStore for FileStore {
    async fn get(&self, id: &DestinationId) -> Result<Option<Destination>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.destinations.get(id).cloned())
    }

    async fn find(&self, query: &OverlapQuery) -> Result<Vec<Destination>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .destinations
            .values()
            .filter(|candidate| query.admits(candidate))
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<Destination>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.destinations.values().cloned().collect())
    }
}

#[async_trait]
impl MatchingStore for FileStore {
    async fn get(&self, id: &DestinationId) -> Result<Option<Matching>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.matchings.get(id).cloned())
    }

    async fn insert(&self, record: Matching) -> Result<InsertResult, Error> {
        let result = {
            let mut state_guard = self.state.write().await;
            let result = insert_if_absent(&mut state_guard.matchings, record);
            state_guard.dirty |= result == InsertResult::Inserted;
            result
        };
        self.persist_if(result == InsertResult::Inserted).await?;
        Ok(result)
    }

    async fn add_to_set(
        &self,
        owner: &DestinationId,
        entry: &Destination,
    ) -> Result<SetUpdate, Error> {
        let result = {
            let mut state_guard = self.state.write().await;
            let result = add_to_set(&mut state_guard.matchings, owner, entry);
            state_guard.dirty |= result == SetUpdate::Modified;
            result
        };
        self.persist_if(result == SetUpdate::Modified).await?;
        Ok(result)
    }

    async fn pull(&self, owner: &DestinationId, entry: &DestinationId) -> Result<SetUpdate, Error> {
        let result = {
            let mut state_guard = self.state.write().await;
            let result = pull(&mut state_guard.matchings, owner, entry);
            state_guard.dirty |= result == SetUpdate::Modified;
            result
        };
        self.persist_if(result == SetUpdate::Modified).await?;
        Ok(result)
    }

    async fn delete(&self, id: &DestinationId) -> Result<bool, Error> {
        let removed = {
            let mut state_guard = self.state.write().await;
            let removed = state_guard.matchings.remove(id).is_some();
            state_guard.dirty |= removed;
            removed
        };
        self.persist_if(removed).await?;
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<Matching>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.matchings.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        self.persist_if(dirty).await
    }
}
