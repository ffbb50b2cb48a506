//! Overlap resolver
//!
//! Finds every other destination that is location-compatible with a given
//! one and owned by someone else. Read-only.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::model::{Destination, DestinationId};
use crate::traits::{DestinationStore, OverlapQuery};

/// Resolves the current matches of a destination
#[derive(Clone)]
pub struct OverlapResolver {
    destinations: Arc<dyn DestinationStore>,
}

impl OverlapResolver {
    /// Create a resolver over a destination store
    pub fn new(destinations: Arc<dyn DestinationStore>) -> Self {
        Self { destinations }
    }

    /// Every existing destination matching `destination`
    ///
    /// Excludes `destination` itself and everything with the same owner.
    pub async fn resolve(&self, destination: &Destination) -> Result<Vec<Destination>> {
        let query = OverlapQuery::for_destination(destination);
        let matches = self.destinations.find(&query).await?;

        debug!(
            "Resolved {} match(es) for {} at {}",
            matches.len(),
            destination.id,
            destination.location
        );
        Ok(matches)
    }

    /// Like [`OverlapResolver::resolve`], starting from an id
    ///
    /// A destination that no longer exists has no matches.
    pub async fn resolve_id(&self, id: &DestinationId) -> Result<Vec<Destination>> {
        match self.destinations.get(id).await? {
            Some(destination) => self.resolve(&destination).await,
            None => {
                debug!("Destination {} not found, resolving to no matches", id);
                Ok(Vec::new())
            }
        }
    }
}
