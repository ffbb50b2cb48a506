//! Configuration types for the destination matcher
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Upper bound for `worker_concurrency`
pub const MAX_WORKER_CONCURRENCY: usize = 256;

/// Main matcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Store backend configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Dispatcher settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl MatcherConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

/// Store backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory stores (not persistent)
    #[default]
    Memory,

    /// Both collections in one JSON file
    File {
        /// Path to the store file
        path: String,
    },

    /// Custom backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::File { .. } => "file",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum number of notifications processed concurrently
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Capacity of the dispatch event channel
    ///
    /// When full, new dispatch events are dropped (with a warning log).
    /// Processing itself is never blocked by a slow event consumer.
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DispatcherConfig {
    /// Validate the dispatcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.worker_concurrency == 0 || self.worker_concurrency > MAX_WORKER_CONCURRENCY {
            return Err(crate::Error::config(format!(
                "worker_concurrency must be between 1 and {}, got {}",
                MAX_WORKER_CONCURRENCY, self.worker_concurrency
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Set the worker concurrency
    pub fn with_worker_concurrency(mut self, worker_concurrency: usize) -> Self {
        self.worker_concurrency = worker_concurrency;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: default_worker_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_worker_concurrency() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    1000
}
