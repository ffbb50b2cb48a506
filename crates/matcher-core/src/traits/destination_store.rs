// # Destination Store Trait
//
// Read-only view of the destination records owned by another service.
//
// ## Usage
//
// ```rust,ignore
// use matcher_core::traits::{DestinationStore, OverlapQuery};
//
// let destination = store.get(&id).await?.expect("exists");
// let candidates = store.find(&OverlapQuery::for_destination(&destination)).await?;
// ```

use async_trait::async_trait;

use crate::model::{Destination, DestinationId, Location, OwnerId};

/// Filter describing "every other destination overlapping this one"
///
/// Backends with a query language translate it; simple backends scan and
/// call [`OverlapQuery::admits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapQuery {
    /// The destination being resolved (never part of the result)
    pub origin: DestinationId,
    /// Its owner (destinations with this owner are excluded)
    pub owner: OwnerId,
    /// Its location
    pub location: Location,
}

impl OverlapQuery {
    /// Build the query for a destination
    pub fn for_destination(destination: &Destination) -> Self {
        Self {
            origin: destination.id.clone(),
            owner: destination.owner.clone(),
            location: destination.location.clone(),
        }
    }

    /// Whether `candidate` satisfies the query
    pub fn admits(&self, candidate: &Destination) -> bool {
        candidate.id != self.origin
            && candidate.owner != self.owner
            && candidate.location.overlaps(&self.location)
    }
}

/// Trait for destination store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Ownership
///
/// The matcher never writes destinations. Creation and removal happen
/// elsewhere and are reported through notifications.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Fetch a destination by id
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Destination))`: The destination exists
    /// - `Ok(None)`: No such destination
    /// - `Err(Error)`: Storage error
    async fn get(&self, id: &DestinationId) -> Result<Option<Destination>, crate::Error>;

    /// Fetch every destination admitted by `query`
    async fn find(&self, query: &OverlapQuery) -> Result<Vec<Destination>, crate::Error>;

    /// Fetch every destination
    ///
    /// Used by consistency audits, not by the event handlers.
    async fn list(&self) -> Result<Vec<Destination>, crate::Error>;
}
