//! Built-in notification sources
//!
//! - [`ChannelSource`]: deliveries pushed through an in-process channel
//! - [`JsonLinesSource`]: one delivery per line of an async reader (stdin,
//!   a file, a socket)

pub mod channel;
pub mod lines;

pub use channel::ChannelSource;
pub use lines::JsonLinesSource;
