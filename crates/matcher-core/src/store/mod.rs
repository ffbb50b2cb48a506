// # Store Implementations
//
// This module provides implementations of the DestinationStore and
// MatchingStore traits, plus the factories the registry uses to build them.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{MemoryDestinationStore, MemoryMatchingStore};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::traits::{StoreFactory, StoreHandles};

/// Factory for [`MemoryDestinationStore`] + [`MemoryMatchingStore`]
pub struct MemoryStoreFactory;

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<StoreHandles> {
        if !matches!(config, StoreConfig::Memory) {
            return Err(Error::config(format!(
                "memory store factory cannot build a '{}' store",
                config.type_name()
            )));
        }

        Ok(StoreHandles::new(
            Arc::new(MemoryDestinationStore::new()),
            Arc::new(MemoryMatchingStore::new()),
        ))
    }
}

/// Factory for [`FileStore`]; one file serves both collections
pub struct FileStoreFactory;

#[async_trait]
impl StoreFactory for FileStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<StoreHandles> {
        let StoreConfig::File { path } = config else {
            return Err(Error::config(format!(
                "file store factory cannot build a '{}' store",
                config.type_name()
            )));
        };

        let store = Arc::new(FileStore::new(path).await?);
        Ok(StoreHandles::new(store.clone(), store))
    }
}
