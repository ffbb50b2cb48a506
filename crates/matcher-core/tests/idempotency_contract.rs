//! Architectural Contract Test: Idempotency
//!
//! This test verifies that at-least-once delivery cannot corrupt the
//! matching graph.
//!
//! Constraints verified:
//! - A redelivered Insert yields the same matched sets as a single Insert
//! - Concurrent deliveries of the same Insert do not duplicate entries
//! - A redelivered Delete is a no-op
//! - File-backed state survives a restart and redelivery on top of it
//!
//! If this test fails, matched sets are not maintained with set semantics.

mod common;

use common::*;
use matcher_core::matcher::{HandleOutcome, Matcher, SkipReason};
use matcher_core::model::Location;
use matcher_core::store::FileStore;
use matcher_core::traits::MatchingStore;
use std::sync::Arc;

#[tokio::test]
async fn duplicate_insert_does_not_change_matched_sets() {
    let world = World::new();
    let a = dest("a", "U1", Location::country("US"));
    let b = dest("b", "U2", Location::new("US", "CA", "SF"));
    world.create(&a).await;
    world.create(&b).await;

    let before_a = world.matched("a").await;
    let before_b = world.matched("b").await;

    let outcome = world.matcher.handle_insert(&b.id).await.unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Linked {
            matches: 1,
            neighbors_updated: 0
        },
        "Redelivery must not modify any neighbor"
    );
    assert_eq!(world.matched("a").await, before_a);
    assert_eq!(world.matched("b").await, before_b);
    world.assert_consistent().await;
}

#[tokio::test]
async fn concurrent_duplicate_inserts_converge() {
    let world = World::new();
    let hub = dest("hub", "U0", Location::country("US"));
    world.create(&hub).await;

    let spoke = dest("spoke", "U1", Location::new("US", "TX", "Austin"));
    world.destinations.put(spoke.clone()).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let matcher = world.matcher.clone();
        let id = spoke.id.clone();
        handles.push(tokio::spawn(async move { matcher.handle_insert(&id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(world.matched("hub").await, Some(vec!["spoke".to_string()]));
    assert_eq!(world.matched("spoke").await, Some(vec!["hub".to_string()]));
    world.assert_consistent().await;
}

#[tokio::test]
async fn duplicate_delete_is_noop() {
    let world = World::new();
    let a = dest("a", "U1", Location::country("US"));
    let b = dest("b", "U2", Location::country("US"));
    world.create(&a).await;
    world.create(&b).await;
    world.remove(&a).await;

    let outcome = world.matcher.handle_delete(&a.id).await.unwrap();

    assert_eq!(outcome, HandleOutcome::Skipped(SkipReason::MatchingMissing));
    assert_eq!(world.matched("b").await, Some(vec![]));
    world.assert_consistent().await;
}

#[tokio::test]
async fn file_backed_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let a = dest("a", "U1", Location::country("US"));
    let b = dest("b", "U2", Location::country("US"));

    // First "run": link both destinations and persist
    {
        let store = Arc::new(FileStore::new(&path).await.unwrap());
        store.put_destination(a.clone()).await.unwrap();
        store.put_destination(b.clone()).await.unwrap();
        let matcher = Matcher::new(store.clone(), store.clone());
        matcher.handle_insert(&a.id).await.unwrap();
        matcher.handle_insert(&b.id).await.unwrap();
        MatchingStore::flush(store.as_ref()).await.unwrap();
    }

    // Second "run": redeliver the insert of b on top of the persisted state
    let store = Arc::new(FileStore::new(&path).await.unwrap());
    let matcher = Matcher::new(store.clone(), store.clone());
    let outcome = matcher.handle_insert(&b.id).await.unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Linked {
            matches: 1,
            neighbors_updated: 0
        }
    );
    let record = MatchingStore::get(store.as_ref(), &a.id).await.unwrap().unwrap();
    assert_eq!(record.matched.len(), 1);
    assert!(record.contains(&b.id));
}
