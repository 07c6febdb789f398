//! Incremental smoothed statistics per (subject, metric).
//!
//! Each record carries its `sampleCount`, which doubles as the optimistic
//! concurrency token: a write only lands if the count is still the one that
//! was read. A losing writer logs and drops its observation; the next
//! observation re-converges the average.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HearthError, HearthResult};
use crate::traits::{KeyValueStore, StoreItem, WriteCondition};
use crate::types::{ema_key, EffortLevel};

/// Smoothing factors for each metric family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaConfig {
    /// Alpha for effort-per-activity. Default: 0.3.
    pub effort_alpha: f64,
    /// Alpha for ignore-rate. Default: 0.2.
    pub ignore_alpha: f64,
    /// Alpha for interaction frequency. Default: 0.3.
    pub frequency_alpha: f64,
}

impl Default for EmaConfig {
    fn default() -> Self {
        Self {
            effort_alpha: 0.3,
            ignore_alpha: 0.2,
            frequency_alpha: 0.3,
        }
    }
}

/// Metric families tracked per subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmaMetric {
    /// Effort for one activity, encoded 1..=3.
    Effort(String),
    /// Whether the subject ignored an assistant message, encoded 0/1.
    IgnoreRate,
    /// Interactions per period, a non-negative count.
    InteractionFrequency,
}

impl EmaMetric {
    /// Metric key as stored.
    pub fn metric_key(&self) -> String {
        match self {
            EmaMetric::Effort(activity) => format!("effort#{}", activity),
            EmaMetric::IgnoreRate => "ignoreRate".to_string(),
            EmaMetric::InteractionFrequency => "interactionFrequency".to_string(),
        }
    }
}

/// Persisted EMA record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmaRecord {
    pub subject_id: String,
    pub metric_key: String,
    pub ema_value: f64,
    pub sample_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_period_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Current smoothed value of a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaSample {
    pub value: f64,
    pub sample_count: u64,
}

/// What an update did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmaUpdate {
    /// First observation, stored unsmoothed.
    Created { value: f64 },
    /// Smoothed into the existing record.
    Updated { value: f64, sample_count: u64 },
    /// Lost a concurrent write; the observation was dropped.
    Conflict,
    /// The period key was already counted; nothing written.
    SamePeriod,
}

/// Round to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// One EMA step: `alpha * observed + (1 - alpha) * previous`, rounded.
pub fn smooth(previous: f64, observed: f64, alpha: f64) -> f64 {
    round4(alpha * observed + (1.0 - alpha) * previous)
}

/// EMA tracker over a [`KeyValueStore`].
pub struct EmaTracker {
    store: Arc<dyn KeyValueStore>,
    config: EmaConfig,
}

impl EmaTracker {
    /// Create a new tracker.
    pub fn new(store: Arc<dyn KeyValueStore>, config: EmaConfig) -> Self {
        Self { store, config }
    }

    /// Smoothing configuration in use.
    pub fn config(&self) -> &EmaConfig {
        &self.config
    }

    /// Read the stored record for a metric.
    pub async fn get_record(
        &self,
        subject_id: &str,
        metric_key: &str,
    ) -> HearthResult<Option<EmaRecord>> {
        let key = ema_key(subject_id, metric_key);
        match self.store.get(&key).await? {
            Some(item) => Ok(Some(item.decode()?)),
            None => Ok(None),
        }
    }

    /// Read the current value and sample count for a metric.
    pub async fn get(&self, subject_id: &str, metric_key: &str) -> HearthResult<Option<EmaSample>> {
        Ok(self
            .get_record(subject_id, metric_key)
            .await?
            .map(|r| EmaSample {
                value: r.ema_value,
                sample_count: r.sample_count,
            }))
    }

    /// Fold an already-encoded observation into the metric.
    pub async fn update(
        &self,
        subject_id: &str,
        metric_key: &str,
        raw_value: f64,
        alpha: f64,
    ) -> HearthResult<EmaUpdate> {
        self.apply(subject_id, metric_key, raw_value, alpha, None)
            .await
    }

    /// Record the effort of one activity occurrence.
    pub async fn record_effort(
        &self,
        subject_id: &str,
        activity_key: &str,
        effort: EffortLevel,
    ) -> HearthResult<EmaUpdate> {
        let metric = EmaMetric::Effort(activity_key.to_string());
        self.update(
            subject_id,
            &metric.metric_key(),
            effort.encode(),
            self.config.effort_alpha,
        )
        .await
    }

    /// Record whether an assistant message to the subject was ignored.
    pub async fn record_ignore(&self, subject_id: &str, ignored: bool) -> HearthResult<EmaUpdate> {
        let raw = if ignored { 1.0 } else { 0.0 };
        self.update(
            subject_id,
            &EmaMetric::IgnoreRate.metric_key(),
            raw,
            self.config.ignore_alpha,
        )
        .await
    }

    /// Record the interaction count for a completed period.
    ///
    /// Only one update is admitted per `period_key`.
    pub async fn record_interaction_frequency(
        &self,
        subject_id: &str,
        period_key: &str,
        count: f64,
    ) -> HearthResult<EmaUpdate> {
        if count < 0.0 {
            return Err(HearthError::validation(format!(
                "interaction count must be non-negative, got {}",
                count
            )));
        }
        self.apply(
            subject_id,
            &EmaMetric::InteractionFrequency.metric_key(),
            count,
            self.config.frequency_alpha,
            Some(period_key),
        )
        .await
    }

    async fn apply(
        &self,
        subject_id: &str,
        metric_key: &str,
        raw_value: f64,
        alpha: f64,
        period_key: Option<&str>,
    ) -> HearthResult<EmaUpdate> {
        if !raw_value.is_finite() {
            return Err(HearthError::validation("EMA observation must be finite"));
        }
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(HearthError::validation(format!(
                "alpha must be in (0, 1], got {}",
                alpha
            )));
        }

        let key = ema_key(subject_id, metric_key);
        let existing: Option<EmaRecord> = match self.store.get(&key).await? {
            Some(item) => Some(item.decode()?),
            None => None,
        };

        let (record, condition, outcome) = match existing {
            None => {
                let value = round4(raw_value);
                let record = EmaRecord {
                    subject_id: subject_id.to_string(),
                    metric_key: metric_key.to_string(),
                    ema_value: value,
                    sample_count: 1,
                    last_period_key: period_key.map(str::to_string),
                    updated_at: Utc::now(),
                };
                (record, WriteCondition::NotExists, EmaUpdate::Created { value })
            }
            Some(previous) => {
                if let (Some(period), Some(last)) = (period_key, previous.last_period_key.as_deref())
                {
                    if period == last {
                        debug!(subject_id, metric_key, period, "Period already counted");
                        return Ok(EmaUpdate::SamePeriod);
                    }
                }

                let value = smooth(previous.ema_value, raw_value, alpha);
                let sample_count = previous.sample_count + 1;
                let record = EmaRecord {
                    subject_id: subject_id.to_string(),
                    metric_key: metric_key.to_string(),
                    ema_value: value,
                    sample_count,
                    last_period_key: period_key
                        .map(str::to_string)
                        .or(previous.last_period_key),
                    updated_at: Utc::now(),
                };
                (
                    record,
                    WriteCondition::attribute_equals("sampleCount", previous.sample_count),
                    EmaUpdate::Updated {
                        value,
                        sample_count,
                    },
                )
            }
        };

        let item = StoreItem::from_record(key, &record)?;
        match self.store.put(item, condition).await {
            Ok(()) => {
                debug!(subject_id, metric_key, value = record.ema_value, "EMA updated");
                Ok(outcome)
            }
            Err(e) if e.is_condition_failed() => {
                warn!(
                    subject_id,
                    metric_key, "Concurrent EMA update lost, dropping observation"
                );
                Ok(EmaUpdate::Conflict)
            }
            Err(e) => Err(e),
        }
    }
}
