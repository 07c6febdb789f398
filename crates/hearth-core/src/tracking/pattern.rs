//! Day-of-week / hour-of-day occurrence histograms per
//! (conversation, subject, activity).
//!
//! Unsynchronized read-modify-write: two truly concurrent occurrences of the
//! same key may under-count by one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HearthResult;
use crate::time::local_day_and_hour;
use crate::traits::{KeyValueStore, StoreItem, WriteCondition};
use crate::types::habit_key;

/// Occurrence histogram for one (conversation, subject, activity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternHabit {
    pub conversation_id: String,
    pub subject_id: String,
    pub activity_key: String,
    /// Monday = 0.
    pub day_counts: [u64; 7],
    pub hour_counts: [u64; 24],
    pub total_count: u64,
    pub last_seen: DateTime<Utc>,
}

impl PatternHabit {
    fn empty(conversation_id: &str, subject_id: &str, activity_key: &str, at: DateTime<Utc>) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            subject_id: subject_id.to_string(),
            activity_key: activity_key.to_string(),
            day_counts: [0; 7],
            hour_counts: [0; 24],
            total_count: 0,
            last_seen: at,
        }
    }

    fn increment(&mut self, day: usize, hour: usize, at: DateTime<Utc>) {
        self.day_counts[day] += 1;
        self.hour_counts[hour] += 1;
        self.total_count += 1;
        if at > self.last_seen || self.total_count == 1 {
            self.last_seen = at;
        }
    }

    /// Most frequent local day (Monday = 0), earliest on ties.
    pub fn peak_day(&self) -> Option<usize> {
        peak(&self.day_counts)
    }

    /// Most frequent local hour, earliest on ties.
    pub fn peak_hour(&self) -> Option<usize> {
        peak(&self.hour_counts)
    }

    /// Whether the bucket sums agree with the total.
    pub fn is_consistent(&self) -> bool {
        self.day_counts.iter().sum::<u64>() == self.total_count
            && self.hour_counts.iter().sum::<u64>() == self.total_count
    }
}

fn peak(counts: &[u64]) -> Option<usize> {
    let max = *counts.iter().max()?;
    if max == 0 {
        return None;
    }
    counts.iter().position(|&c| c == max)
}

/// Aggregates activity occurrences into local-time histograms.
pub struct PatternTracker {
    store: Arc<dyn KeyValueStore>,
    timezone: Tz,
}

impl PatternTracker {
    /// Create a tracker for a household timezone.
    pub fn new(store: Arc<dyn KeyValueStore>, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Record one occurrence at `event_time`.
    pub async fn record_occurrence(
        &self,
        conversation_id: &str,
        subject_id: &str,
        activity_key: &str,
        event_time: DateTime<Utc>,
    ) -> HearthResult<PatternHabit> {
        let (day, hour) = local_day_and_hour(event_time, self.timezone);
        let key = habit_key(conversation_id, subject_id, activity_key);

        let mut habit = match self.store.get(&key).await? {
            Some(item) => item.decode::<PatternHabit>()?,
            None => PatternHabit::empty(conversation_id, subject_id, activity_key, event_time),
        };
        habit.increment(day, hour, event_time);

        let item = StoreItem::from_record(key, &habit)?;
        self.store.put(item, WriteCondition::Always).await?;

        debug!(
            conversation_id,
            subject_id,
            activity_key,
            day,
            hour,
            total = habit.total_count,
            "Recorded habit occurrence"
        );
        Ok(habit)
    }

    /// Read a habit record.
    pub async fn get_habit(
        &self,
        conversation_id: &str,
        subject_id: &str,
        activity_key: &str,
    ) -> HearthResult<Option<PatternHabit>> {
        let key = habit_key(conversation_id, subject_id, activity_key);
        match self.store.get(&key).await? {
            Some(item) => Ok(Some(item.decode()?)),
            None => Ok(None),
        }
    }
}
