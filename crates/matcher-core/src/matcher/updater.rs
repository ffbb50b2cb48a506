//! Adjacency updater
//!
//! Applies symmetric set updates to matching records. Every call is a
//! sequence of independently idempotent single-record operations; nothing
//! here assumes a multi-record transaction.
//!
//! ## Failure Handling
//!
//! A failing neighbor update is logged and counted, and the remaining
//! neighbors are still updated. The caller turns failures into a retryable
//! error so the whole unit is redelivered; redelivery is safe because each
//! step is a set operation.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Destination, DestinationId, Matching};
use crate::traits::{InsertResult, MatchingStore, SetUpdate};

/// What [`AdjacencyUpdater::link`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// The destination's own record was created by this call
    pub created: bool,
    /// Neighbor records that gained the destination
    pub neighbors_updated: usize,
    /// Neighbors without a matching record (not inserted yet, or deleted)
    pub missing_neighbors: Vec<DestinationId>,
    /// Neighbor updates that failed
    pub failed: usize,
}

/// What [`AdjacencyUpdater::unlink`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlinkReport {
    /// Neighbor records that lost the destination
    pub neighbors_updated: usize,
    /// Neighbors whose record was already gone
    pub missing_neighbors: usize,
}

/// Applies insert/delete side effects to matching records
#[derive(Clone)]
pub struct AdjacencyUpdater {
    matchings: Arc<dyn MatchingStore>,
}

impl AdjacencyUpdater {
    /// Create an updater over a matching store
    pub fn new(matchings: Arc<dyn MatchingStore>) -> Self {
        Self { matchings }
    }

    /// Link a destination with its resolved matches
    ///
    /// Creates the destination's record with `matches` as its matched set.
    /// If the record already exists (redelivery), `matches` are set-unioned
    /// into it instead, keeping entries added concurrently by neighbors.
    /// Then adds the destination to every neighbor's record.
    ///
    /// # Errors
    ///
    /// Failures on the destination's own record are returned immediately.
    /// Neighbor failures are only counted in [`LinkReport::failed`].
    pub async fn link(&self, destination: &Destination, matches: &[Destination]) -> Result<LinkReport> {
        let mut report = LinkReport::default();

        let record = Matching::new(destination.clone(), matches.iter().cloned());
        match self.matchings.insert(record).await? {
            InsertResult::Inserted => {
                report.created = true;
            }
            InsertResult::AlreadyExists => {
                debug!(
                    "Matching for {} already exists, merging {} match(es)",
                    destination.id,
                    matches.len()
                );
                for entry in matches {
                    self.matchings.add_to_set(&destination.id, entry).await?;
                }
            }
        }

        for neighbor in matches {
            match self.matchings.add_to_set(&neighbor.id, destination).await {
                Ok(SetUpdate::Modified) => report.neighbors_updated += 1,
                Ok(SetUpdate::Unchanged) => {}
                Ok(SetUpdate::MissingRecord) => {
                    debug!(
                        "No matching for neighbor {} of {}, skipping",
                        neighbor.id, destination.id
                    );
                    report.missing_neighbors.push(neighbor.id.clone());
                }
                Err(e) => {
                    warn!(
                        "Failed to add {} to matching of {}: {}",
                        destination.id, neighbor.id, e
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Remove a destination from every record that references it, then
    /// delete its own record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(UnlinkReport))`: The record existed and is gone
    /// - `Ok(None)`: No record existed (already unlinked)
    /// - `Err(Error::PartialApplication)`: Some neighbors could not be
    ///   updated; the destination's own record is kept so a retry can find
    ///   them again
    pub async fn unlink(&self, id: &DestinationId) -> Result<Option<UnlinkReport>> {
        let Some(record) = self.matchings.get(id).await? else {
            return Ok(None);
        };

        let mut report = UnlinkReport::default();
        let mut failed = 0;

        for neighbor in record.matched_ids() {
            match self.matchings.pull(neighbor, id).await {
                Ok(SetUpdate::Modified) => report.neighbors_updated += 1,
                Ok(SetUpdate::Unchanged) => {}
                Ok(SetUpdate::MissingRecord) => report.missing_neighbors += 1,
                Err(e) => {
                    warn!("Failed to remove {} from matching of {}: {}", id, neighbor, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(Error::partial_application(
                id.as_str(),
                failed,
                record.matched.len(),
            ));
        }

        self.matchings.delete(id).await?;
        Ok(Some(report))
    }

    /// Remove one entry from a destination's own record
    pub async fn detach(&self, owner: &DestinationId, entry: &DestinationId) -> Result<SetUpdate> {
        self.matchings.pull(owner, entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, OwnerId};
    use crate::store::MemoryMatchingStore;

    fn dest(id: &str, owner: &str) -> Destination {
        Destination::new(
            DestinationId::parse(id).unwrap(),
            OwnerId::new(owner),
            Location::country("US"),
        )
    }

    #[tokio::test]
    async fn test_link_creates_record_and_updates_neighbors() {
        let store = Arc::new(MemoryMatchingStore::new());
        let updater = AdjacencyUpdater::new(store.clone());
        let a = dest("a", "u1");
        let b = dest("b", "u2");
        let c = dest("c", "u3");
        store.insert(Matching::new(b.clone(), [])).await.unwrap();

        let report = updater.link(&a, &[b.clone(), c.clone()]).await.unwrap();

        assert!(report.created);
        assert_eq!(report.neighbors_updated, 1);
        assert_eq!(report.missing_neighbors, vec![c.id.clone()]);
        assert_eq!(report.failed, 0);

        let own = store.get(&a.id).await.unwrap().unwrap();
        assert!(own.contains(&b.id) && own.contains(&c.id));
        assert!(store.get(&b.id).await.unwrap().unwrap().contains(&a.id));
    }

    #[tokio::test]
    async fn test_link_twice_merges_instead_of_duplicating() {
        let store = Arc::new(MemoryMatchingStore::new());
        let updater = AdjacencyUpdater::new(store.clone());
        let a = dest("a", "u1");
        let b = dest("b", "u2");
        store.insert(Matching::new(b.clone(), [])).await.unwrap();

        updater.link(&a, &[b.clone()]).await.unwrap();
        let second = updater.link(&a, &[b.clone()]).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.neighbors_updated, 0);
        assert_eq!(store.get(&a.id).await.unwrap().unwrap().matched.len(), 1);
        assert_eq!(store.get(&b.id).await.unwrap().unwrap().matched.len(), 1);
    }

    #[tokio::test]
    async fn test_unlink_removes_all_references() {
        let store = Arc::new(MemoryMatchingStore::new());
        let updater = AdjacencyUpdater::new(store.clone());
        let a = dest("a", "u1");
        let b = dest("b", "u2");
        store.insert(Matching::new(b.clone(), [])).await.unwrap();
        updater.link(&a, &[b.clone()]).await.unwrap();

        let report = updater.unlink(&a.id).await.unwrap().unwrap();

        assert_eq!(report.neighbors_updated, 1);
        assert!(store.get(&a.id).await.unwrap().is_none());
        assert!(store.get(&b.id).await.unwrap().unwrap().matched.is_empty());
        assert!(updater.unlink(&a.id).await.unwrap().is_none());
    }
}
