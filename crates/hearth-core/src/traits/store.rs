//! Persistent store trait and related types.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{HearthError, HearthResult};

/// Composite (partition, sort) key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    /// Partition key.
    pub partition: String,
    /// Sort key within the partition.
    pub sort: String,
}

impl StoreKey {
    /// Create a new composite key.
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// A stored item: a key plus a flat attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    /// Composite key.
    pub key: StoreKey,
    /// Attribute payload.
    pub attributes: HashMap<String, serde_json::Value>,
}

impl StoreItem {
    /// Create a new item.
    pub fn new(key: StoreKey, attributes: HashMap<String, serde_json::Value>) -> Self {
        Self { key, attributes }
    }

    /// Build an item from any serializable record that encodes to a JSON object.
    pub fn from_record<T: Serialize>(key: StoreKey, record: &T) -> HearthResult<Self> {
        match serde_json::to_value(record)? {
            serde_json::Value::Object(map) => Ok(Self {
                key,
                attributes: map.into_iter().collect(),
            }),
            other => Err(HearthError::validation(format!(
                "record for {} must serialize to an object, got {}",
                key, other
            ))),
        }
    }

    /// Decode the attribute map into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> HearthResult<T> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            HearthError::parse(format!("failed to decode item {}: {}", self.key, e))
        })
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}

/// Precondition attached to a write.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WriteCondition {
    /// Unconditional write.
    #[default]
    Always,
    /// The item must not already exist.
    NotExists,
    /// The item must exist and the named attribute must equal `value`.
    AttributeEquals {
        name: String,
        value: serde_json::Value,
    },
}

impl WriteCondition {
    /// Condition on an attribute holding an expected prior value.
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::AttributeEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Evaluate the condition against the current item, if any.
    ///
    /// Adapters call this while holding whatever lock makes the
    /// read-compare-write atomic.
    pub fn is_satisfied_by(&self, current: Option<&StoreItem>) -> bool {
        match self {
            WriteCondition::Always => true,
            WriteCondition::NotExists => current.is_none(),
            WriteCondition::AttributeEquals { name, value } => current
                .and_then(|item| item.get(name))
                .map(|actual| json_equal(actual, value))
                .unwrap_or(false),
        }
    }
}

/// Compare JSON values, treating integral and float encodings of the same number as equal.
fn json_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Core store trait - all persistence backends implement this.
///
/// Four operations are assumed of the backing engine: point get, put
/// (optionally conditional), prefix query within a partition and delete.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get an item by key.
    async fn get(&self, key: &StoreKey) -> HearthResult<Option<StoreItem>>;

    /// Write an item, failing with [`HearthError::ConditionFailed`] when the
    /// condition does not hold.
    async fn put(&self, item: StoreItem, condition: WriteCondition) -> HearthResult<()>;

    /// List items in `partition` whose sort key starts with `sort_prefix`,
    /// ordered by sort key.
    async fn query_prefix(
        &self,
        partition: &str,
        sort_prefix: &str,
        limit: Option<usize>,
    ) -> HearthResult<Vec<StoreItem>>;

    /// Delete an item. Deleting a missing item is not an error.
    async fn delete(&self, key: &StoreKey) -> HearthResult<()>;

    /// Backend name for logging.
    fn backend_name(&self) -> &str;
}

/// Persistent store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Process-local, lost on exit.
    #[default]
    Memory,
    /// Single-file SQLite database.
    Sqlite,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub provider: StoreProvider,
    /// Database file for file-backed providers.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let hearth_dir = dirs::home_dir()
            .map(|h| h.join(".hearth"))
            .unwrap_or_else(|| PathBuf::from(".hearth"));
        Self {
            provider: StoreProvider::Memory,
            path: hearth_dir.join("hearth.db"),
        }
    }
}
