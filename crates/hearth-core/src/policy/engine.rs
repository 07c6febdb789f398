//! The response policy engine.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::clarify::clarification_prompt;
use crate::error::HearthResult;
use crate::policy::rules::{first_silence, RuleContext};
use crate::policy::{LedgerStore, PolicyConfig};
use crate::routing::ContentType;
use crate::tracking::{EmaSample, PreferenceSource};
use crate::traits::{ContentPolicy, PolicyVerdict};
use crate::types::{ClassificationType, ClassifiedEvent};

/// Why no response is sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    None,
    QuietHours,
    DailyCap,
    FastConversation,
    Cooldown,
    LowConfidence,
    PreferenceSuppressed,
    LowFrequencySuppressed,
    Tone,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PolicyDecision {
    Respond {
        text: String,
        content_type: ContentType,
    },
    Suppress {
        reason: SuppressionReason,
    },
}

impl PolicyDecision {
    fn suppress(reason: SuppressionReason) -> Self {
        PolicyDecision::Suppress { reason }
    }

    pub fn should_respond(&self) -> bool {
        matches!(self, PolicyDecision::Respond { .. })
    }

    pub fn reason(&self) -> Option<SuppressionReason> {
        match self {
            PolicyDecision::Suppress { reason } => Some(*reason),
            PolicyDecision::Respond { .. } => None,
        }
    }
}

/// Decides whether and what to reply to a classified event.
pub struct ResponsePolicyEngine {
    config: PolicyConfig,
    timezone: Tz,
    ledger: Arc<LedgerStore>,
    content_policy: Arc<dyn ContentPolicy>,
    preferences: Option<Arc<dyn PreferenceSource>>,
}

impl ResponsePolicyEngine {
    pub fn new(
        config: PolicyConfig,
        timezone: Tz,
        ledger: Arc<LedgerStore>,
        content_policy: Arc<dyn ContentPolicy>,
    ) -> Self {
        Self {
            config,
            timezone,
            ledger,
            content_policy,
            preferences: None,
        }
    }

    /// Enable preference-aware suppression.
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceSource>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Evaluate an event as of its occurrence time.
    pub async fn evaluate(&self, event: &ClassifiedEvent) -> HearthResult<PolicyDecision> {
        let Some(activity) = event
            .activity_key
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && event.kind != ClassificationType::None)
        else {
            return Ok(PolicyDecision::suppress(SuppressionReason::None));
        };

        let snapshot = self.ledger.snapshot(&event.conversation_id).await?;
        let ctx = RuleContext {
            event,
            snapshot: &snapshot,
            config: &self.config,
            timezone: self.timezone,
            now: event.occurred_at,
        };
        if let Some(reason) = first_silence(&ctx) {
            debug!(conversation_id = %event.conversation_id, %reason, "Silenced");
            return Ok(PolicyDecision::suppress(reason));
        }

        let (text, content_type) = self.compose(event.confidence, activity);

        if let Some(reason) = self.preference_suppression(&event.subject_id, content_type).await {
            debug!(subject_id = %event.subject_id, %reason, "Suppressed by preference");
            return Ok(PolicyDecision::suppress(reason));
        }

        if let PolicyVerdict::Invalid { reason } = self.content_policy.check(&text) {
            warn!(conversation_id = %event.conversation_id, %reason, "Candidate failed content policy");
            return Ok(PolicyDecision::suppress(SuppressionReason::Tone));
        }

        Ok(PolicyDecision::Respond { text, content_type })
    }

    /// Acknowledge confident events, ask about the rest.
    fn compose(&self, confidence: f64, activity: &str) -> (String, ContentType) {
        if confidence >= self.config.high_floor {
            (format!("Noted, {}.", activity), ContentType::Acknowledgment)
        } else {
            (clarification_prompt(activity), ContentType::Clarification)
        }
    }

    async fn preference_suppression(
        &self,
        subject_id: &str,
        content_type: ContentType,
    ) -> Option<SuppressionReason> {
        let preferences = self.preferences.as_ref()?;
        match content_type {
            ContentType::Acknowledgment => {
                let sample = read_preference(preferences.ignore_rate(subject_id).await, "ignore_rate")?;
                (sample.sample_count >= self.config.preference_min_samples
                    && sample.value > self.config.ignore_rate_threshold)
                    .then_some(SuppressionReason::PreferenceSuppressed)
            }
            ContentType::Clarification => {
                let sample = read_preference(
                    preferences.interaction_frequency(subject_id).await,
                    "interaction_frequency",
                )?;
                (sample.sample_count >= self.config.preference_min_samples
                    && sample.value < self.config.low_frequency_threshold)
                    .then_some(SuppressionReason::LowFrequencySuppressed)
            }
            _ => None,
        }
    }
}

fn read_preference(result: HearthResult<Option<EmaSample>>, metric: &str) -> Option<EmaSample> {
    match result {
        Ok(sample) => sample,
        Err(e) => {
            warn!(metric, error = %e, "Preference read failed, ignoring");
            None
        }
    }
}
