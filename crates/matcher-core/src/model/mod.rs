//! Domain model
//!
//! - [`Destination`]: a located resource owned by a user
//! - [`Location`]: country / region / city with explicit wildcards
//! - [`Matching`]: the adjacency record of one destination
//! - [`Notification`] / [`Delivery`]: inbound insert/delete events

pub mod destination;
pub mod location;
pub mod matching;
pub mod notification;

pub use destination::{Destination, DestinationId, OwnerId};
pub use location::{Location, LocationField};
pub use matching::Matching;
pub use notification::{
    Delivery, DeliveryMetadata, Notification, NotificationKind, ParsedNotification,
    parse_notification,
};
