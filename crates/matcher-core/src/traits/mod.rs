//! Core traits for the destination matcher
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DestinationStore`]: Read access to destination records
//! - [`MatchingStore`]: Set-conditioned updates of matching records
//! - [`NotificationSource`]: Stream of inbound deliveries
//! - [`StoreFactory`]: Build store backends from configuration

pub mod destination_store;
pub mod matching_store;
pub mod notification_source;
pub mod store_factory;

pub use destination_store::{DestinationStore, OverlapQuery};
pub use matching_store::{InsertResult, MatchingStore, SetUpdate};
pub use notification_source::NotificationSource;
pub use store_factory::{StoreFactory, StoreHandles};
