//! Incremental maintenance of the matching graph
//!
//! The [`Matcher`] reacts to one notification at a time:
//!
//! - **Insert**: resolve the destination's matches, create its record, add it
//!   to every neighbor's record
//! - **Delete**: remove the destination from every neighbor's record, delete
//!   its own record
//!
//! ## Event Flow
//!
//! ```text
//! Notification ──▶ Matcher ──▶ OverlapResolver (insert only)
//!                     │
//!                     └──────▶ AdjacencyUpdater ──▶ MatchingStore
//! ```
//!
//! No state is kept between calls; every call reloads from the stores. Both
//! paths are idempotent and tolerate at-least-once, unordered delivery.

pub mod audit;
pub mod resolver;
pub mod updater;

pub use audit::{Violation, audit};
pub use resolver::OverlapResolver;
pub use updater::{AdjacencyUpdater, LinkReport, UnlinkReport};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{DestinationId, Notification, NotificationKind};
use crate::traits::{DestinationStore, MatchingStore, StoreHandles};

/// Why a notification required no changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Insert for a destination that no longer exists
    DestinationMissing,
    /// Delete for a destination without a matching record
    MatchingMissing,
    /// The destination was removed while its insert was being processed
    DestinationRemovedDuringInsert,
}

/// Result of handling one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Insert applied
    Linked {
        /// Size of the resolved match set
        matches: usize,
        /// Neighbor records that gained the destination
        neighbors_updated: usize,
    },
    /// Delete applied
    Unlinked {
        /// Neighbor records that lost the destination
        neighbors_updated: usize,
    },
    /// Nothing to do
    Skipped(SkipReason),
}

/// Insert/delete handlers over a destination store and a matching store
#[derive(Clone)]
pub struct Matcher {
    destinations: Arc<dyn DestinationStore>,
    matchings: Arc<dyn MatchingStore>,
    resolver: OverlapResolver,
    updater: AdjacencyUpdater,
}

impl Matcher {
    /// Create a matcher
    pub fn new(destinations: Arc<dyn DestinationStore>, matchings: Arc<dyn MatchingStore>) -> Self {
        Self {
            resolver: OverlapResolver::new(Arc::clone(&destinations)),
            updater: AdjacencyUpdater::new(Arc::clone(&matchings)),
            destinations,
            matchings,
        }
    }

    /// Create a matcher over a registry-built store pair
    pub fn from_handles(stores: &StoreHandles) -> Self {
        Self::new(Arc::clone(&stores.destinations), Arc::clone(&stores.matchings))
    }

    /// The matching store this matcher writes to
    pub fn matchings(&self) -> &Arc<dyn MatchingStore> {
        &self.matchings
    }

    /// Handle a validated notification
    pub async fn handle(&self, notification: &Notification) -> Result<HandleOutcome> {
        match notification.kind {
            NotificationKind::Insert => self.handle_insert(&notification.destination_id).await,
            NotificationKind::Delete => self.handle_delete(&notification.destination_id).await,
        }
    }

    /// Insert path
    ///
    /// 1. Load the destination; gone → skip
    /// 2. Resolve its matches and link them
    /// 3. Re-read every resolved neighbor and drop the ones that vanished
    /// 4. Re-check the destination; if it vanished meanwhile, unlink it again
    ///    so a racing delete cannot leave dangling references
    pub async fn handle_insert(&self, id: &DestinationId) -> Result<HandleOutcome> {
        let Some(destination) = self.destinations.get(id).await? else {
            debug!("Destination {} no longer exists, nothing to link", id);
            return Ok(HandleOutcome::Skipped(SkipReason::DestinationMissing));
        };

        let matches = self.resolver.resolve(&destination).await?;
        let report = self.updater.link(&destination, &matches).await?;

        // A neighbor whose delete ran while linking never reaches this record
        for neighbor in &matches {
            if self.destinations.get(&neighbor.id).await?.is_none() {
                debug!("Neighbor {} of {} was removed, detaching", neighbor.id, id);
                self.updater.detach(id, &neighbor.id).await?;
            }
        }

        if self.destinations.get(id).await?.is_none() {
            warn!("Destination {} was removed while being linked, unlinking", id);
            self.updater.unlink(id).await?;
            return Ok(HandleOutcome::Skipped(
                SkipReason::DestinationRemovedDuringInsert,
            ));
        }

        if report.failed > 0 {
            return Err(Error::partial_application(
                id.as_str(),
                report.failed,
                matches.len(),
            ));
        }

        info!(
            "Linked {} with {} match(es) ({} neighbor record(s) updated, {} without a record)",
            id,
            matches.len(),
            report.neighbors_updated,
            report.missing_neighbors.len()
        );
        Ok(HandleOutcome::Linked {
            matches: matches.len(),
            neighbors_updated: report.neighbors_updated,
        })
    }

    /// Delete path
    ///
    /// Works from the stored matching record only; the destination itself is
    /// usually gone already.
    pub async fn handle_delete(&self, id: &DestinationId) -> Result<HandleOutcome> {
        match self.updater.unlink(id).await? {
            Some(report) => {
                info!(
                    "Unlinked {} ({} neighbor record(s) updated, {} already gone)",
                    id, report.neighbors_updated, report.missing_neighbors
                );
                Ok(HandleOutcome::Unlinked {
                    neighbors_updated: report.neighbors_updated,
                })
            }
            None => {
                debug!("No matching for {}, already unlinked", id);
                Ok(HandleOutcome::Skipped(SkipReason::MatchingMissing))
            }
        }
    }
}
