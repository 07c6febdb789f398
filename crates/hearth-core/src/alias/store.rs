//! Scoped alias vocabulary persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::error::{HearthError, HearthResult};
use crate::traits::{KeyValueStore, StoreItem, WriteCondition};
use crate::types::{alias_key, alias_partition};

/// Where an alias entry came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AliasSource {
    /// Built-in, read-only.
    Seed,
    /// Learned from a clarification reply.
    Learned,
}

/// One alias mapping within a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasEntry {
    pub scope_id: String,
    pub alias_key: String,
    pub canonical_activity: String,
    pub confirmations: u64,
    pub source: AliasSource,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AliasEntry {
    /// A built-in entry presented within `scope_id`.
    pub fn seed(scope_id: &str, alias_key: &str, canonical_activity: &str) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            alias_key: normalize_alias_key(alias_key),
            canonical_activity: canonical_activity.to_string(),
            confirmations: 0,
            source: AliasSource::Seed,
            updated_at: None,
        }
    }
}

/// Outcome of [`AliasStore::increment_confirmation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationUpdate {
    /// Counter incremented to the contained value.
    Incremented(u64),
    /// No learned entry exists for the key.
    Missing,
    /// A concurrent writer changed the entry; the increment was dropped.
    Conflict,
}

/// Normalize an alias key: trimmed, lowercased, inner whitespace collapsed,
/// surrounding punctuation removed.
pub fn normalize_alias_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// CRUD over learned aliases.
pub struct AliasStore {
    store: Arc<dyn KeyValueStore>,
    max_scope_entries: usize,
}

impl AliasStore {
    /// Create an alias store reading at most `max_scope_entries` per scope.
    pub fn new(store: Arc<dyn KeyValueStore>, max_scope_entries: usize) -> Self {
        Self {
            store,
            max_scope_entries,
        }
    }

    fn checked_key(raw: &str) -> HearthResult<String> {
        let key = normalize_alias_key(raw);
        if key.is_empty() {
            return Err(HearthError::validation(format!(
                "alias key '{}' is empty after normalization",
                raw
            )));
        }
        Ok(key)
    }

    /// Create or overwrite a learned alias. Confirmations start at zero.
    pub async fn put_alias(
        &self,
        scope_id: &str,
        raw_key: &str,
        canonical_activity: &str,
    ) -> HearthResult<AliasEntry> {
        let key = Self::checked_key(raw_key)?;
        let entry = AliasEntry {
            scope_id: scope_id.to_string(),
            alias_key: key.clone(),
            canonical_activity: canonical_activity.to_string(),
            confirmations: 0,
            source: AliasSource::Learned,
            updated_at: Some(Utc::now()),
        };
        let item = StoreItem::from_record(alias_key(scope_id, &key), &entry)?;
        self.store.put(item, WriteCondition::Always).await?;
        debug!(scope_id, alias_key = %key, canonical_activity, "Alias written");
        Ok(entry)
    }

    /// Read one learned alias.
    pub async fn get_alias(&self, scope_id: &str, raw_key: &str) -> HearthResult<Option<AliasEntry>> {
        let key = Self::checked_key(raw_key)?;
        match self.store.get(&alias_key(scope_id, &key)).await? {
            Some(item) => Ok(Some(item.decode()?)),
            None => Ok(None),
        }
    }

    /// Increment the confirmation counter of a learned alias.
    pub async fn increment_confirmation(
        &self,
        scope_id: &str,
        raw_key: &str,
    ) -> HearthResult<ConfirmationUpdate> {
        let Some(mut entry) = self.get_alias(scope_id, raw_key).await? else {
            return Ok(ConfirmationUpdate::Missing);
        };
        let previous = entry.confirmations;
        entry.confirmations += 1;
        entry.updated_at = Some(Utc::now());

        let item = StoreItem::from_record(alias_key(scope_id, &entry.alias_key), &entry)?;
        match self
            .store
            .put(item, WriteCondition::attribute_equals("confirmations", previous))
            .await
        {
            Ok(()) => Ok(ConfirmationUpdate::Incremented(entry.confirmations)),
            Err(e) if e.is_condition_failed() => {
                warn!(scope_id, alias_key = %entry.alias_key, "Concurrent confirmation lost");
                Ok(ConfirmationUpdate::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a learned alias.
    pub async fn delete_alias(&self, scope_id: &str, raw_key: &str) -> HearthResult<()> {
        let key = Self::checked_key(raw_key)?;
        self.store.delete(&alias_key(scope_id, &key)).await
    }

    /// All learned aliases of a scope, in one bounded range read.
    pub async fn get_aliases_for_scope(&self, scope_id: &str) -> HearthResult<Vec<AliasEntry>> {
        let items = self
            .store
            .query_prefix(&alias_partition(scope_id), "", Some(self.max_scope_entries))
            .await?;
        items.iter().map(|item| item.decode()).collect()
    }
}
