// # Notification Source Trait
//
// Adapter between a delivery mechanism (queue, bus, pipe) and the
// dispatcher.
//
// ## Delivery Semantics
//
// Sources may deliver a notification more than once and in any order. The
// dispatcher and handlers are idempotent, so sources need no deduplication.
//
// ## Implementations
//
// - `source::ChannelSource`: in-process channel, for embedding and tests
// - `source::JsonLinesSource`: one JSON delivery per line of a reader

use std::pin::Pin;
use tokio_stream::Stream;

use crate::model::Delivery;

/// Trait for notification source implementations
///
/// # Rules
///
/// - Sources only translate; they never parse ids or call the stores
/// - Sources never retry; redelivery belongs to the delivery mechanism
/// - Dropping the stream must release the source's resources
pub trait NotificationSource: Send + Sync {
    /// Stream of deliveries
    ///
    /// The stream ends when the underlying mechanism is exhausted. Called
    /// once per dispatcher run.
    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = Delivery> + Send + 'static>>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}
