// # Matching Store Trait
//
// Defines the interface for the stored adjacency lists.
//
// ## Purpose
//
// Every mutation is a single-record, set-membership-conditioned update
// (insert-if-absent, add-to-set, pull, delete). Handlers never read a
// record, edit it in memory and write it back, so concurrent units touching
// the same record cannot lose each other's updates.
//
// ## Implementations
//
// - In-memory: `store::memory`
// - JSON file: `store::file`

use async_trait::async_trait;

use crate::model::{Destination, DestinationId, Matching};

/// Outcome of [`MatchingStore::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// The record was created
    Inserted,
    /// A record for this destination already existed and was left untouched
    AlreadyExists,
}

/// Outcome of a set update on one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetUpdate {
    /// The matched set changed
    Modified,
    /// The matched set already had the requested shape (no-op)
    Unchanged,
    /// No record exists for the owning destination
    MissingRecord,
}

/// Trait for matching store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks, and
/// each method must be atomic with respect to the record it touches.
#[async_trait]
pub trait MatchingStore: Send + Sync {
    /// Fetch the record of a destination
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Matching))`: The record
    /// - `Ok(None)`: No record found
    /// - `Err(Error)`: Storage error
    async fn get(&self, id: &DestinationId) -> Result<Option<Matching>, crate::Error>;

    /// Insert a new record unless one already exists for the destination
    async fn insert(&self, record: Matching) -> Result<InsertResult, crate::Error>;

    /// Set-union `entry` into the matched set of `owner`'s record
    ///
    /// Adding the owner to its own record is a no-op (`Unchanged`).
    async fn add_to_set(
        &self,
        owner: &DestinationId,
        entry: &Destination,
    ) -> Result<SetUpdate, crate::Error>;

    /// Remove `entry` from the matched set of `owner`'s record
    async fn pull(
        &self,
        owner: &DestinationId,
        entry: &DestinationId,
    ) -> Result<SetUpdate, crate::Error>;

    /// Delete the record of a destination
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The record existed and was deleted
    /// - `Ok(false)`: No record existed
    /// - `Err(Error)`: Storage error
    async fn delete(&self, id: &DestinationId) -> Result<bool, crate::Error>;

    /// Fetch every record
    async fn list(&self) -> Result<Vec<Matching>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
