// # matcher-core
//
// Core library for the event-driven destination matcher.
//
// ## Architecture Overview
//
// This library keeps a symmetric "matching" graph between destinations
// up to date as destinations are inserted and deleted:
// - **DestinationStore**: Read access to destinations (system of record)
// - **MatchingStore**: Per-destination adjacency records with set updates
// - **NotificationSource**: Stream of inbound insert/delete deliveries
// - **Matcher**: Insert/delete handlers (overlap resolver + adjacency updater)
// - **Dispatcher**: Bounded concurrent dispatch of deliveries to the Matcher
// - **StoreRegistry**: Plugin-based registry for store backends
//
// ## Design Principles
//
// 1. **Per-record updates**: Every mutation touches exactly one record
// 2. **Event-Driven**: Deliveries arrive as an async stream
// 3. **Plugin-Based**: Store backends are registered by name
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Redelivered or reordered notifications converge

pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod registry;
pub mod source;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{DispatcherConfig, MatcherConfig, StoreConfig};
pub use engine::{DispatchEvent, Dispatcher, Disposition};
pub use error::{Error, Result};
pub use matcher::{HandleOutcome, Matcher, SkipReason};
pub use model::{Destination, DestinationId, Location, LocationField, Matching, OwnerId};
pub use registry::StoreRegistry;
pub use source::{ChannelSource, JsonLinesSource};
pub use store::{FileStore, MemoryDestinationStore, MemoryMatchingStore};
pub use traits::{DestinationStore, MatchingStore, NotificationSource};
