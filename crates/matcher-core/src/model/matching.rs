//! Matching records: the stored adjacency list of one destination

use serde::{Deserialize, Serialize};

use super::destination::{Destination, DestinationId};

/// Adjacency record for one destination
///
/// `matched` keeps insertion order but is a set keyed by destination id:
/// [`Matching::add`] and [`Matching::remove`] never create duplicates and
/// tolerate repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
    /// The destination this record belongs to
    pub destination: Destination,
    /// Destinations currently considered matches
    #[serde(default)]
    pub matched: Vec<Destination>,
}

impl Matching {
    /// Create a record, dropping duplicate and self entries from `matched`
    pub fn new(destination: Destination, matched: impl IntoIterator<Item = Destination>) -> Self {
        let mut record = Self {
            destination,
            matched: Vec::new(),
        };
        for entry in matched {
            record.add(entry);
        }
        record
    }

    /// Id of the owning destination
    pub fn id(&self) -> &DestinationId {
        &self.destination.id
    }

    /// Whether `id` is in the matched set
    pub fn contains(&self, id: &DestinationId) -> bool {
        self.matched.iter().any(|d| &d.id == id)
    }

    /// Set-union a destination into the matched set
    ///
    /// Returns `true` if the set changed. The owning destination itself is
    /// never added.
    pub fn add(&mut self, entry: Destination) -> bool {
        if entry.id == self.destination.id || self.contains(&entry.id) {
            return false;
        }
        self.matched.push(entry);
        true
    }

    /// Remove a destination from the matched set
    ///
    /// Returns `true` if the set changed.
    pub fn remove(&mut self, id: &DestinationId) -> bool {
        let before = self.matched.len();
        self.matched.retain(|d| &d.id != id);
        self.matched.len() != before
    }

    /// Ids of the matched destinations, in insertion order
    pub fn matched_ids(&self) -> impl Iterator<Item = &DestinationId> {
        self.matched.iter().map(|d| &d.id)
    }
}
