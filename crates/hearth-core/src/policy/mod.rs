//! Response policy: whether, and what, to reply to a classified event.
//!
//! Evaluation is strictly ordered and first match wins:
//! 1. nothing recognised
//! 2. hard silence rules ([`SILENCE_RULES`])
//! 3. candidate composition (acknowledgment or disambiguation question)
//! 4. preference-aware suppression, when a [`PreferenceSource`](crate::tracking::PreferenceSource) is supplied
//! 5. content policy on the candidate text
//!
//! The engine never writes. Callers record responses in the
//! [`LedgerStore`] only after a confirmed send.

mod engine;
mod ledger;
mod rules;
mod tone;

use chrono::{Duration, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

pub use engine::{PolicyDecision, ResponsePolicyEngine, SuppressionReason};
pub use ledger::{ConversationSnapshot, LedgerStore, RecentMessage};
pub use rules::{first_silence, RuleContext, SilenceRule, SILENCE_RULES};
pub use tone::PatternContentPolicy;

/// Local-time window during which the assistant stays silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub enabled: bool,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: true,
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
        }
    }
}

impl QuietHours {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether a local wall-clock time falls inside the window.
    /// Windows where `start > end` wrap midnight; `start == end` is empty.
    pub fn contains(&self, local: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let t = local.with_nanosecond(0).unwrap_or(local);
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

/// Response policy thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub quiet_hours: QuietHours,
    /// Maximum responses per conversation per local day.
    pub daily_cap: u32,
    /// Other-party messages within the window that make a conversation "fast".
    pub fast_conversation_messages: usize,
    pub fast_conversation_window_secs: i64,
    /// Minimum gap after a successful response.
    pub cooldown_minutes: i64,
    /// Below this confidence, stay silent unless directly addressed.
    pub clarify_floor: f64,
    /// At or above this confidence, acknowledge instead of asking.
    pub high_floor: f64,
    /// Samples a preference signal needs before it is trusted.
    pub preference_min_samples: u64,
    pub ignore_rate_threshold: f64,
    pub low_frequency_threshold: f64,
}

impl PolicyConfig {
    /// Upper bound for `fast_conversation_window_secs` (one day).
    pub const MAX_FAST_CONVERSATION_WINDOW_SECS: i64 = 86_400;
    /// Upper bound for `cooldown_minutes` (one week).
    pub const MAX_COOLDOWN_MINUTES: i64 = 10_080;

    /// The fast-conversation window, clamped to its valid range.
    pub fn fast_conversation_window(&self) -> Duration {
        Duration::seconds(
            self.fast_conversation_window_secs
                .clamp(0, Self::MAX_FAST_CONVERSATION_WINDOW_SECS),
        )
    }

    /// The post-response cooldown, clamped to its valid range.
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes.clamp(0, Self::MAX_COOLDOWN_MINUTES))
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            quiet_hours: QuietHours::default(),
            daily_cap: 3,
            fast_conversation_messages: 3,
            fast_conversation_window_secs: 60,
            cooldown_minutes: 15,
            clarify_floor: 0.50,
            high_floor: 0.85,
            preference_min_samples: 10,
            ignore_rate_threshold: 0.70,
            low_frequency_threshold: 1.0,
        }
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}
