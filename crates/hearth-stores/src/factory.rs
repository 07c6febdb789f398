//! Factory for creating store providers.

use std::sync::Arc;

use hearth_core::error::HearthResult;
use hearth_core::stores::MemoryStore;
use hearth_core::traits::{KeyValueStore, StoreConfig, StoreProvider};
use tracing::info;

use crate::sqlite::SqliteStore;

/// Factory for creating store providers.
pub struct StoreFactory;

impl StoreFactory {
    /// Create a store from the given configuration.
    pub fn create(config: &StoreConfig) -> HearthResult<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match config.provider {
            StoreProvider::Memory => Arc::new(MemoryStore::new()),
            StoreProvider::Sqlite => Arc::new(SqliteStore::new(&config.path)?),
        };
        info!(backend = store.backend_name(), "Store ready");
        Ok(store)
    }
}
