//! Plugin-based store registry
//!
//! The registry maps store type names to factories, so the daemon builds
//! its stores from configuration without hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use matcher_core::registry::StoreRegistry;
//! use matcher_core::config::StoreConfig;
//!
//! let registry = StoreRegistry::with_builtin();
//! registry.register("mongo", Box::new(MongoStoreFactory::new(client)));
//!
//! let stores = registry.create(&StoreConfig::Memory).await?;
//! ```

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::{FileStoreFactory, MemoryStoreFactory};
use crate::traits::{StoreFactory, StoreHandles};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Store registry for plugin-based backend creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct StoreRegistry {
    factories: RwLock<HashMap<String, Arc<dyn StoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `memory` and `file` backends
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register("memory", Box::new(MemoryStoreFactory));
        registry.register("file", Box::new(FileStoreFactory));
        registry
    }

    /// Register a store factory under a type name
    ///
    /// Registering an existing name replaces the previous factory.
    pub fn register(&self, name: impl Into<String>, factory: Box<dyn StoreFactory>) {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        factories.insert(name.into(), Arc::from(factory));
    }

    /// Create stores from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(StoreHandles)`: Created stores
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create(&self, config: &StoreConfig) -> Result<StoreHandles> {
        config.validate()?;
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = {
            let factories = self
                .factories
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            factories
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        factory.create(config).await
    }

    /// List all registered store types
    pub fn list(&self) -> Vec<String> {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store type is registered
    pub fn has(&self, name: &str) -> bool {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        factories.contains_key(name)
    }
}
