//! In-process store backed by an ordered map.
//!
//! Data lives only as long as the process. Used for tests, replay runs and
//! single-process deployments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::HearthResult;
use crate::traits::{KeyValueStore, StoreItem, StoreKey, WriteCondition};

/// Ordered in-memory [`KeyValueStore`].
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<StoreKey, StoreItem>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> HearthResult<Option<StoreItem>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn put(&self, item: StoreItem, condition: WriteCondition) -> HearthResult<()> {
        let mut items = self.items.write().await;
        if !condition.is_satisfied_by(items.get(&item.key)) {
            return Err(crate::error::HearthError::condition_failed(
                item.key.partition.clone(),
                item.key.sort.clone(),
            ));
        }
        items.insert(item.key.clone(), item);
        Ok(())
    }

    async fn query_prefix(
        &self,
        partition: &str,
        sort_prefix: &str,
        limit: Option<usize>,
    ) -> HearthResult<Vec<StoreItem>> {
        let items = self.items.read().await;
        let start = StoreKey::new(partition, sort_prefix);
        let matching = items
            .range(start..)
            .take_while(|(key, _)| key.partition == partition && key.sort.starts_with(sort_prefix))
            .map(|(_, item)| item.clone());

        Ok(match limit {
            Some(n) => matching.take(n).collect(),
            None => matching.collect(),
        })
    }

    async fn delete(&self, key: &StoreKey) -> HearthResult<()> {
        self.items.write().await.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
