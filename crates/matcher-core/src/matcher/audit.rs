//! Consistency audit over whole stores
//!
//! Checks the matching graph invariants against the current destinations.
//! Transient violations are expected while notifications are in flight; a
//! quiescent system must audit clean.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::Result;
use crate::model::{Destination, DestinationId, Matching};
use crate::traits::{DestinationStore, MatchingStore};

/// A broken graph invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A record lists its own destination
    SelfMatch { id: DestinationId },
    /// A record lists a destination with the same owner
    SameOwner { record: DestinationId, entry: DestinationId },
    /// A record lists an entry more than once
    Duplicate { record: DestinationId, entry: DestinationId },
    /// A record lists a destination that no longer exists
    Dangling { record: DestinationId, entry: DestinationId },
    /// `from` lists `to`, but `to`'s record does not list `from`
    Asymmetric { from: DestinationId, to: DestinationId },
    /// An existing destination has no record
    MissingRecord { id: DestinationId },
    /// A record exists for a destination that no longer exists
    OrphanRecord { id: DestinationId },
    /// Two destinations match but neither record lists the other
    MissedMatch { a: DestinationId, b: DestinationId },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SelfMatch { id } => write!(f, "{} matches itself", id),
            Violation::SameOwner { record, entry } => {
                write!(f, "{} matches {} with the same owner", record, entry)
            }
            Violation::Duplicate { record, entry } => {
                write!(f, "{} lists {} more than once", record, entry)
            }
            Violation::Dangling { record, entry } => {
                write!(f, "{} lists missing destination {}", record, entry)
            }
            Violation::Asymmetric { from, to } => {
                write!(f, "{} lists {} but not the other way round", from, to)
            }
            Violation::MissingRecord { id } => write!(f, "{} has no matching record", id),
            Violation::OrphanRecord { id } => {
                write!(f, "matching record {} has no destination", id)
            }
            Violation::MissedMatch { a, b } => write!(f, "{} and {} match but are not linked", a, b),
        }
    }
}

/// Audit the matching graph
pub async fn audit(
    destinations: &dyn DestinationStore,
    matchings: &dyn MatchingStore,
) -> Result<Vec<Violation>> {
    let destinations = destinations.list().await?;
    let records = matchings.list().await?;
    Ok(check(&destinations, &records))
}

/// Audit already-loaded collections
pub fn check(destinations: &[Destination], records: &[Matching]) -> Vec<Violation> {
    let by_id: HashMap<&DestinationId, &Destination> =
        destinations.iter().map(|d| (&d.id, d)).collect();
    let records_by_id: HashMap<&DestinationId, &Matching> =
        records.iter().map(|r| (r.id(), r)).collect();
    let mut violations = Vec::new();

    for destination in destinations {
        if !records_by_id.contains_key(&destination.id) {
            violations.push(Violation::MissingRecord {
                id: destination.id.clone(),
            });
        }
    }

    for record in records {
        let id = record.id();
        if !by_id.contains_key(id) {
            violations.push(Violation::OrphanRecord { id: id.clone() });
        }

        let mut seen = HashSet::new();
        for entry in &record.matched {
            if &entry.id == id {
                violations.push(Violation::SelfMatch { id: id.clone() });
                continue;
            }
            if !seen.insert(&entry.id) {
                violations.push(Violation::Duplicate {
                    record: id.clone(),
                    entry: entry.id.clone(),
                });
                continue;
            }
            if entry.owner == record.destination.owner {
                violations.push(Violation::SameOwner {
                    record: id.clone(),
                    entry: entry.id.clone(),
                });
            }
            if !by_id.contains_key(&entry.id) {
                violations.push(Violation::Dangling {
                    record: id.clone(),
                    entry: entry.id.clone(),
                });
            } else if let Some(other) = records_by_id.get(&entry.id)
                && !other.contains(id)
            {
                violations.push(Violation::Asymmetric {
                    from: id.clone(),
                    to: entry.id.clone(),
                });
            }
        }
    }

    for (i, a) in destinations.iter().enumerate() {
        for b in &destinations[i + 1..] {
            if !a.matches(b) {
                continue;
            }
            let (Some(ra), Some(rb)) = (records_by_id.get(&a.id), records_by_id.get(&b.id)) else {
                continue;
            };
            if !ra.contains(&b.id) && !rb.contains(&a.id) {
                violations.push(Violation::MissedMatch {
                    a: a.id.clone(),
                    b: b.id.clone(),
                });
            }
        }
    }

    violations
}
