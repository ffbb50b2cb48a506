// # Memory Stores
//
// In-memory implementations of DestinationStore and MatchingStore.
//
// ## Purpose
//
// Fast stores that don't persist across restarts. Useful for testing and
// for embedding the matcher next to an in-process destination registry.
//
// ## Atomicity
//
// Every trait method runs under a single write (or read) lock, so each
// set update is atomic with respect to its record.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{Destination, DestinationId, Matching};
use crate::traits::{DestinationStore, InsertResult, MatchingStore, OverlapQuery, SetUpdate};

/// In-memory destination store
///
/// The matcher only reads destinations; [`MemoryDestinationStore::put`] and
/// [`MemoryDestinationStore::remove`] stand in for the service that owns them.
///
/// # Example
///
/// ```rust,no_run
/// use matcher_core::model::{Destination, DestinationId, Location, OwnerId};
/// use matcher_core::store::MemoryDestinationStore;
/// use matcher_core::traits::DestinationStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDestinationStore::new();
///     let id = DestinationId::parse("d1")?;
///     store
///         .put(Destination::new(id.clone(), OwnerId::new("u1"), Location::country("US")))
///         .await;
///
///     assert!(store.get(&id).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDestinationStore {
    inner: Arc<RwLock<BTreeMap<DestinationId, Destination>>>,
}

impl MemoryDestinationStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a destination
    pub async fn put(&self, destination: Destination) {
        let mut guard = self.inner.write().await;
        guard.insert(destination.id.clone(), destination);
    }

    /// Remove a destination, returning it if it existed
    pub async fn remove(&self, id: &DestinationId) -> Option<Destination> {
        let mut guard = self.inner.write().await;
        guard.remove(id)
    }

    /// Get the number of destinations in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl DestinationStore for MemoryDestinationStore {
    async fn get(&self, id: &DestinationId) -> Result<Option<Destination>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn find(&self, query: &OverlapQuery) -> Result<Vec<Destination>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .filter(|candidate| query.admits(candidate))
            .cloned()
            .collect())
    }

    async fn list(&self) -> Result<Vec<Destination>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.values().cloned().collect())
    }
}

/// In-memory matching store
#[derive(Debug, Clone, Default)]
pub struct MemoryMatchingStore {
    inner: Arc<RwLock<BTreeMap<DestinationId, Matching>>>,
}

impl MemoryMatchingStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl MatchingStore for MemoryMatchingStore {
    async fn get(&self, id: &DestinationId) -> Result<Option<Matching>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn insert(&self, record: Matching) -> Result<InsertResult, Error> {
        let mut guard = self.inner.write().await;
        Ok(insert_if_absent(&mut guard, record))
    }

    async fn add_to_set(
        &self,
        owner: &DestinationId,
        entry: &Destination,
    ) -> Result<SetUpdate, Error> {
        let mut guard = self.inner.write().await;
        Ok(add_to_set(&mut guard, owner, entry))
    }

    async fn pull(&self, owner: &DestinationId, entry: &DestinationId) -> Result<SetUpdate, Error> {
        let mut guard = self.inner.write().await;
        Ok(pull(&mut guard, owner, entry))
    }

    async fn delete(&self, id: &DestinationId) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<Matching>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Conditioned record operations shared by the map-backed stores
pub(crate) fn insert_if_absent(
    records: &mut BTreeMap<DestinationId, Matching>,
    record: Matching,
) -> InsertResult {
    if records.contains_key(record.id()) {
        return InsertResult::AlreadyExists;
    }
    records.insert(record.id().clone(), record);
    InsertResult::Inserted
}

pub(crate) fn add_to_set(
    records: &mut BTreeMap<DestinationId, Matching>,
    owner: &DestinationId,
    entry: &Destination,
) -> SetUpdate {
    let Some(record) = records.get_mut(owner) else {
        return SetUpdate::MissingRecord;
    };
    if record.add(entry.clone()) {
        SetUpdate::Modified
    } else {
        SetUpdate::Unchanged
    }
}

pub(crate) fn pull(
    records: &mut BTreeMap<DestinationId, Matching>,
    owner: &DestinationId,
    entry: &DestinationId,
) -> SetUpdate {
    let Some(record) = records.get_mut(owner) else {
        return SetUpdate::MissingRecord;
    };
    if record.remove(entry) {
        SetUpdate::Modified
    } else {
        SetUpdate::Unchanged
    }
}
