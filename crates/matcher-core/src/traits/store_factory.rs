//! Construction of store backends from configuration

use async_trait::async_trait;
use std::sync::Arc;

use super::{DestinationStore, MatchingStore};
use crate::config::StoreConfig;

/// The pair of stores one backend provides
#[derive(Clone)]
pub struct StoreHandles {
    /// Destination records (read-only for the matcher)
    pub destinations: Arc<dyn DestinationStore>,
    /// Matching records
    pub matchings: Arc<dyn MatchingStore>,
}

impl StoreHandles {
    /// Bundle two stores
    pub fn new(destinations: Arc<dyn DestinationStore>, matchings: Arc<dyn MatchingStore>) -> Self {
        Self {
            destinations,
            matchings,
        }
    }
}

/// Helper trait for constructing store backends from configuration
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Create the stores described by `config`
    async fn create(&self, config: &StoreConfig) -> Result<StoreHandles, crate::Error>;
}
