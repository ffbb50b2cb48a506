//! Architectural Contract Test: Event Dispatch
//!
//! This test verifies how the dispatcher turns deliveries into handler
//! calls and dispositions.
//!
//! Constraints verified:
//! - Insert/Delete notifications reach the matcher
//! - Unknown operation kinds are dropped, not failed
//! - Malformed identifiers fail the delivery
//! - The dispatcher stops when the source ends or on shutdown, drains
//!   in-flight units and flushes the matching store
//!
//! If this test fails, dispatch semantics are broken.

mod common;

use common::*;
use matcher_core::config::DispatcherConfig;
use matcher_core::engine::{DispatchEvent, Dispatcher};
use matcher_core::matcher::{HandleOutcome, Matcher};
use matcher_core::model::{Delivery, DeliveryMetadata, Location, Notification, NotificationKind};
use matcher_core::source::{ChannelSource, JsonLinesSource};
use std::sync::Arc;
use tokio::sync::mpsc;

fn insert(id_str: &str, message_id: &str) -> Delivery {
    Delivery::for_notification(&Notification::insert(id(id_str)), DeliveryMetadata::new(message_id))
}

fn drain(mut events: mpsc::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn dispatcher_processes_stream_until_exhausted() {
    let store = FlakyMatchingStore::new();
    let world = World::with_matchings(Arc::new(FlakyMatchingStore::sharing_counters_with(&store)));
    world.destinations.put(dest("a", "U1", Location::country("US"))).await;
    world.destinations.put(dest("b", "U2", Location::country("US"))).await;

    let (source, tx) = ChannelSource::new();
    let (dispatcher, events) = Dispatcher::new(
        Box::new(source),
        Arc::new(world.matcher.clone()),
        &DispatcherConfig::default(),
    )
    .expect("dispatcher construction succeeds");

    tx.send(insert("a", "m1")).unwrap();
    tx.send(Delivery::new(
        r#"{"type":"Upsert","destinationId":"a"}"#,
        DeliveryMetadata::new("m2"),
    ))
    .unwrap();
    tx.send(Delivery::new(
        r#"{"type":"Insert","destinationId":"not a valid id!"}"#,
        DeliveryMetadata::new("m3"),
    ))
    .unwrap();
    drop(tx);

    dispatcher.run_with_shutdown(None).await.unwrap();

    let events = drain(events);
    assert!(matches!(events.first(), Some(DispatchEvent::Started { .. })));
    assert!(matches!(events.last(), Some(DispatchEvent::Stopped { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        DispatchEvent::Completed { message_id, kind: NotificationKind::Insert, .. } if message_id == "m1"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DispatchEvent::Dropped { message_id, .. } if message_id == "m2"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DispatchEvent::Failed { message_id, .. } if message_id == "m3"
    )));

    assert_eq!(world.matched("a").await, Some(vec!["b".to_string()]));
    assert_eq!(store.flush_call_count(), 1, "store must be flushed on stop");
}

#[tokio::test]
async fn concurrent_inserts_build_consistent_graph() {
    let world = World::new();
    let mut destinations = Vec::new();
    for i in 0..40 {
        let location = match i % 4 {
            0 => Location::country("US"),
            1 => Location::new("US", "CA", ""),
            2 => Location::new("US", "CA", "SF"),
            _ => Location::new("US", "NY", "NYC"),
        };
        let d = dest(&format!("d{i}"), &format!("U{}", i % 7), location);
        world.destinations.put(d.clone()).await;
        destinations.push(d);
    }

    let (source, tx) = ChannelSource::new();
    let config = DispatcherConfig::default().with_worker_concurrency(8);
    let (dispatcher, _events) =
        Dispatcher::new(Box::new(source), Arc::new(world.matcher.clone()), &config).unwrap();

    for (i, d) in destinations.iter().enumerate() {
        tx.send(insert(d.id.as_str(), &format!("m{i}"))).unwrap();
    }
    drop(tx);

    dispatcher.run().await.unwrap();

    world.assert_consistent().await;
}

#[tokio::test]
async fn shutdown_signal_stops_idle_dispatcher() {
    let world = World::new();
    let (source, _tx) = ChannelSource::new();
    let (dispatcher, events) = Dispatcher::new(
        Box::new(source),
        Arc::new(world.matcher.clone()),
        &DispatcherConfig::default(),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { dispatcher.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(tokio::time::Duration::from_secs(1), handle)
        .await
        .expect("dispatcher stops promptly")
        .unwrap()
        .unwrap();

    let events = drain(events);
    assert_eq!(
        events.last(),
        Some(&DispatchEvent::Stopped {
            reason: "Shutdown signal".to_string()
        })
    );
}

#[tokio::test]
async fn json_lines_source_drives_insert_and_delete() {
    let world = World::new();
    world.destinations.put(dest("a", "U1", Location::country("US"))).await;
    world.destinations.put(dest("b", "U2", Location::country("US"))).await;

    let input = concat!(
        "{\"type\":\"Insert\",\"destinationId\":\"a\"}\n",
        "{\"messageId\":\"42\",\"deliveryCount\":1,\"body\":{\"Type\":0,\"DestinationId\":\"b\"}}\n",
    );
    let matcher = Arc::new(world.matcher.clone());
    let source = JsonLinesSource::new(tokio::io::BufReader::new(input.as_bytes()));
    let config = DispatcherConfig::default().with_worker_concurrency(1);
    let (dispatcher, _events) = Dispatcher::new(Box::new(source), Arc::clone(&matcher), &config).unwrap();
    dispatcher.run_with_shutdown(None).await.unwrap();

    assert_eq!(world.matched("a").await, Some(vec!["b".to_string()]));

    // Delete b through the per-message entry point
    world.destinations.remove(&id("b")).await;
    let delete = Delivery::for_notification(&Notification::delete(id("b")), DeliveryMetadata::new("m9"));
    let disposition = dispatcher.dispatch(delete).await;

    assert!(disposition.is_settled());
    assert_eq!(world.matched("a").await, Some(vec![]));
    world.assert_consistent().await;
}

#[tokio::test]
async fn matcher_used_directly_and_via_dispatcher_agree() {
    let world = World::new();
    let a = dest("a", "U1", Location::new("US", "CA", "SF"));
    world.destinations.put(a.clone()).await;

    let direct = Matcher::from_handles(&matcher_core::traits::StoreHandles::new(
        Arc::new(world.destinations.clone()),
        Arc::clone(&world.matchings),
    ));
    let outcome = direct.handle(&Notification::insert(a.id.clone())).await.unwrap();

    assert_eq!(
        outcome,
        HandleOutcome::Linked {
            matches: 0,
            neighbors_updated: 0
        }
    );
    assert_eq!(world.matched("a").await, Some(vec![]));
}
