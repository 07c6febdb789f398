//! Per-conversation facts the response policy reads.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HearthResult;
use crate::time::local_day_key;
use crate::traits::{KeyValueStore, StoreItem, WriteCondition};
use crate::types::ledger_key;

/// One inbound message, as seen by the fast-conversation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentMessage {
    pub sender_id: String,
    pub at: DateTime<Utc>,
}

/// Stored ledger for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    #[serde(default)]
    pub conversation_id: String,
    /// Local day the response counter belongs to.
    #[serde(default)]
    pub day_key: String,
    #[serde(default)]
    pub responses_today: u32,
    #[serde(default)]
    pub last_response_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recent_inbound: Vec<RecentMessage>,
}

impl ConversationSnapshot {
    /// Responses sent on the given local day.
    pub fn responses_on(&self, day_key: &str) -> u32 {
        if self.day_key == day_key {
            self.responses_today
        } else {
            0
        }
    }

    /// Messages from anyone but `subject_id` within `(now - window, now]`.
    pub fn other_party_messages(&self, subject_id: &str, now: DateTime<Utc>, window: Duration) -> usize {
        let since = now - window;
        self.recent_inbound
            .iter()
            .filter(|m| m.sender_id != subject_id && m.at > since && m.at <= now)
            .count()
    }
}

/// Best-effort read-modify-write persistence of [`ConversationSnapshot`]s.
pub struct LedgerStore {
    store: Arc<dyn KeyValueStore>,
    timezone: Tz,
    retention: Duration,
    max_recent: usize,
}

impl LedgerStore {
    /// Inbound messages are kept for `retention` behind the newest one, at most `max_recent`.
    pub fn new(store: Arc<dyn KeyValueStore>, timezone: Tz, retention: Duration, max_recent: usize) -> Self {
        Self {
            store,
            timezone,
            retention,
            max_recent,
        }
    }

    /// Current ledger for a conversation; empty if none exists.
    pub async fn snapshot(&self, conversation_id: &str) -> HearthResult<ConversationSnapshot> {
        match self.store.get(&ledger_key(conversation_id)).await? {
            Some(item) => item.decode(),
            None => Ok(ConversationSnapshot {
                conversation_id: conversation_id.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Note an inbound message.
    pub async fn record_inbound(&self, conversation_id: &str, sender_id: &str, at: DateTime<Utc>) -> HearthResult<()> {
        let mut ledger = self.snapshot(conversation_id).await?;
        if ledger
            .recent_inbound
            .iter()
            .any(|m| m.sender_id == sender_id && m.at == at)
        {
            debug!(conversation_id, sender_id, "Duplicate inbound ignored");
            return Ok(());
        }
        ledger.recent_inbound.push(RecentMessage {
            sender_id: sender_id.to_string(),
            at,
        });
        ledger.recent_inbound.sort_by_key(|m| m.at);

        if let Some(newest) = ledger.recent_inbound.last().map(|m| m.at) {
            let cutoff = newest - self.retention;
            ledger.recent_inbound.retain(|m| m.at > cutoff);
        }
        let excess = ledger.recent_inbound.len().saturating_sub(self.max_recent);
        ledger.recent_inbound.drain(..excess);

        self.write(conversation_id, &ledger).await
    }

    /// Note a successful response and return the count for the ledger's
    /// current day. A response dated before that day leaves the counter alone.
    pub async fn record_response(&self, conversation_id: &str, at: DateTime<Utc>) -> HearthResult<u32> {
        let mut ledger = self.snapshot(conversation_id).await?;
        let day_key = local_day_key(at, self.timezone);
        // YYYY-MM-DD keys order lexically.
        if day_key.as_str() >= ledger.day_key.as_str() {
            ledger.responses_today = ledger.responses_on(&day_key) + 1;
            ledger.day_key = day_key;
        } else {
            debug!(
                conversation_id,
                day_key = %day_key,
                current_day = %ledger.day_key,
                "Late response for an earlier day"
            );
        }
        ledger.last_response_at = Some(ledger.last_response_at.map_or(at, |prev| prev.max(at)));

        self.write(conversation_id, &ledger).await?;
        debug!(
            conversation_id,
            responses_today = ledger.responses_today,
            "Response recorded"
        );
        Ok(ledger.responses_today)
    }

    async fn write(&self, conversation_id: &str, ledger: &ConversationSnapshot) -> HearthResult<()> {
        let mut ledger = ledger.clone();
        ledger.conversation_id = conversation_id.to_string();
        let item = StoreItem::from_record(ledger_key(conversation_id), &ledger)?;
        self.store.put(item, WriteCondition::Always).await
    }
}
