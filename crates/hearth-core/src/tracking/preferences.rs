//! Preference data consumed by the response policy.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HearthResult;
use crate::tracking::{EmaMetric, EmaSample, EmaTracker};

/// Source of per-subject preference signals.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    /// Smoothed rate at which the subject ignores assistant messages.
    async fn ignore_rate(&self, subject_id: &str) -> HearthResult<Option<EmaSample>>;

    /// Smoothed interactions per period.
    async fn interaction_frequency(&self, subject_id: &str) -> HearthResult<Option<EmaSample>>;
}

/// [`PreferenceSource`] reading the EMA tracker.
pub struct EmaPreferenceSource {
    tracker: Arc<EmaTracker>,
}

impl EmaPreferenceSource {
    pub fn new(tracker: Arc<EmaTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl PreferenceSource for EmaPreferenceSource {
    async fn ignore_rate(&self, subject_id: &str) -> HearthResult<Option<EmaSample>> {
        self.tracker
            .get(subject_id, &EmaMetric::IgnoreRate.metric_key())
            .await
    }

    async fn interaction_frequency(&self, subject_id: &str) -> HearthResult<Option<EmaSample>> {
        self.tracker
            .get(subject_id, &EmaMetric::InteractionFrequency.metric_key())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::tracking::EmaConfig;

    #[tokio::test]
    async fn test_reads_tracked_metrics() {
        let tracker = Arc::new(EmaTracker::new(
            Arc::new(MemoryStore::new()),
            EmaConfig::default(),
        ));
        tracker.record_ignore("sam", true).await.unwrap();

        let source = EmaPreferenceSource::new(tracker.clone());
        let rate = source.ignore_rate("sam").await.unwrap().unwrap();
        assert_eq!(rate.value, 1.0);
        assert_eq!(rate.sample_count, 1);
        assert!(source.interaction_frequency("sam").await.unwrap().is_none());
    }
}
