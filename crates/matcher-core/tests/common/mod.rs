//! Test doubles and common utilities for matcher contract tests
//!
//! Real in-memory stores are used wherever possible; the doubles here only
//! add failure injection and call counting on top of them.

#![allow(dead_code)]

use matcher_core::error::{Error, Result};
use matcher_core::matcher::{Matcher, Violation, audit};
use matcher_core::model::{Destination, DestinationId, Location, Matching, OwnerId};
use matcher_core::store::{MemoryDestinationStore, MemoryMatchingStore};
use matcher_core::traits::{InsertResult, MatchingStore, SetUpdate};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shorthand for a destination id
pub fn id(s: &str) -> DestinationId {
    DestinationId::parse(s).expect("valid test id")
}

/// Shorthand for a destination
pub fn dest(id_str: &str, owner: &str, location: Location) -> Destination {
    Destination::new(id(id_str), OwnerId::new(owner), location)
}

/// A matching store that fails set updates on selected records
///
/// Wraps a [`MemoryMatchingStore`]; everything not marked as failing is
/// passed through unchanged.
pub struct FlakyMatchingStore {
    inner: MemoryMatchingStore,
    failing: Arc<Mutex<HashSet<DestinationId>>>,
    add_to_set_call_count: Arc<AtomicUsize>,
    pull_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
}

impl FlakyMatchingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryMatchingStore::new(),
            failing: Arc::new(Mutex::new(HashSet::new())),
            add_to_set_call_count: Arc::new(AtomicUsize::new(0)),
            pull_call_count: Arc::new(AtomicUsize::new(0)),
            flush_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a FlakyMatchingStore that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            failing: Arc::clone(&other.failing),
            add_to_set_call_count: Arc::clone(&other.add_to_set_call_count),
            pull_call_count: Arc::clone(&other.pull_call_count),
            flush_call_count: Arc::clone(&other.flush_call_count),
        }
    }

    /// Make set updates on `owner`'s record fail
    pub fn fail_updates_of(&self, owner: &DestinationId) {
        self.failing.lock().unwrap().insert(owner.clone());
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Get the number of times add_to_set() was called
    pub fn add_to_set_call_count(&self) -> usize {
        self.add_to_set_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times pull() was called
    pub fn pull_call_count(&self) -> usize {
        self.pull_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times flush() was called
    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }

    fn check(&self, owner: &DestinationId) -> Result<()> {
        if self.failing.lock().unwrap().contains(owner) {
            return Err(Error::store("matchings", format!("injected failure on {}", owner)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MatchingStore for FlakyMatchingStore {
    async fn get(&self, id: &DestinationId) -> Result<Option<Matching>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: Matching) -> Result<InsertResult> {
        self.inner.insert(record).await
    }

    async fn add_to_set(&self, owner: &DestinationId, entry: &Destination) -> Result<SetUpdate> {
        self.add_to_set_call_count.fetch_add(1, Ordering::SeqCst);
        self.check(owner)?;
        self.inner.add_to_set(owner, entry).await
    }

    async fn pull(&self, owner: &DestinationId, entry_id: &DestinationId) -> Result<SetUpdate> {
        self.pull_call_count.fetch_add(1, Ordering::SeqCst);
        self.check(owner)?;
        self.inner.pull(owner, entry_id).await
    }

    async fn delete(&self, id: &DestinationId) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> Result<Vec<Matching>> {
        self.inner.list().await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A destination store and a matching store wired to one Matcher
///
/// `create` and `remove` mimic the producer: change the system of record,
/// then notify.
pub struct World {
    pub destinations: MemoryDestinationStore,
    pub matchings: Arc<dyn MatchingStore>,
    pub matcher: Matcher,
}

impl World {
    pub fn new() -> Self {
        Self::with_matchings(Arc::new(MemoryMatchingStore::new()))
    }

    pub fn with_matchings(matchings: Arc<dyn MatchingStore>) -> Self {
        let destinations = MemoryDestinationStore::new();
        let matcher = Matcher::new(Arc::new(destinations.clone()), Arc::clone(&matchings));
        Self {
            destinations,
            matchings,
            matcher,
        }
    }

    /// Store a destination and handle its Insert
    pub async fn create(&self, destination: &Destination) {
        self.destinations.put(destination.clone()).await;
        self.matcher
            .handle_insert(&destination.id)
            .await
            .expect("insert succeeds");
    }

    /// Remove a destination and handle its Delete
    pub async fn remove(&self, destination: &Destination) {
        self.destinations.remove(&destination.id).await;
        self.matcher
            .handle_delete(&destination.id)
            .await
            .expect("delete succeeds");
    }

    /// Sorted ids in `id`'s matched set, `None` without a record
    pub async fn matched(&self, id_str: &str) -> Option<Vec<String>> {
        let record = self.matchings.get(&id(id_str)).await.unwrap()?;
        let mut ids: Vec<String> = record.matched_ids().map(|m| m.to_string()).collect();
        ids.sort();
        Some(ids)
    }

    /// Every graph invariant violation
    pub async fn violations(&self) -> Vec<Violation> {
        audit(&self.destinations, self.matchings.as_ref())
            .await
            .unwrap()
    }

    /// Panic unless the graph audits clean
    pub async fn assert_consistent(&self) {
        let violations = self.violations().await;
        assert!(
            violations.is_empty(),
            "graph is inconsistent: {}",
            violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        );
    }
}
