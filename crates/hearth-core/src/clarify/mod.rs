//! Clarification reply handling.
//!
//! When the assistant asks "Did you mean X?", the user's reply is classified
//! deterministically first (affirmative words, negation prefixes) and only a
//! negated remainder is sent to the classification collaborator. Vocabulary
//! is mutated only on explicit confirmation or a confident correction.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::alias::{AliasKeySource, AliasStore, ConfirmationUpdate};
use crate::error::HearthResult;
use crate::traits::{classify_or_none, Classifier};
use crate::types::PromptRef;

static PROMPT_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*did you mean\s+(.+?)\s*\?\s*$").expect("valid regex"));

static NEGATION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:not quite|nope|nah|not|no|actually)\b[\s,;:.!\-]*").expect("valid regex")
});

static CORRECTION_FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:i meant|i mean|it was|it is|it's|its)\b[\s,;:]*").expect("valid regex")
});

const AFFIRMATIVES: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "yup",
    "y",
    "correct",
    "right",
    "exactly",
    "that's right",
    "thats right",
    "sure",
    "ok",
    "okay",
    "indeed",
];

/// Build the disambiguation question for a candidate activity.
pub fn clarification_prompt(activity: &str) -> String {
    format!("Did you mean {}?", activity)
}

/// Extract the suggested activity from a disambiguation question.
pub fn suggested_activity(prompt_text: &str) -> Option<String> {
    PROMPT_TEMPLATE
        .captures(prompt_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(|c: char| c == '"' || c == '\'').trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Trim, lowercase, strip trailing punctuation.
pub fn normalize_reply(reply: &str) -> String {
    reply
        .trim()
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_string()
}

/// Whether the normalized reply is an explicit yes.
pub fn is_affirmative(normalized: &str) -> bool {
    AFFIRMATIVES.contains(&normalized)
}

/// Strip a negation prefix. `None` if the reply is not a negation, otherwise
/// the (possibly empty) remainder.
pub fn strip_negation(normalized: &str) -> Option<String> {
    let m = NEGATION_PREFIX.find(normalized)?;
    let rest = normalized[m.end()..].trim();
    let rest = match CORRECTION_FILLER.find(rest) {
        Some(filler) => rest[filler.end()..].trim(),
        None => rest,
    };
    Some(rest.to_string())
}

/// Settings for correction handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarificationConfig {
    /// Minimum classifier confidence for a correction to be learned.
    pub correction_confidence_floor: f64,
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            correction_confidence_floor: 0.70,
        }
    }
}

/// What a handled reply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClarificationAction {
    Confirmed,
    Corrected,
}

/// Why a reply was not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    NotClarification,
    RejectedNoRemainder,
    LowConfidence,
    Ambiguous,
}

/// Outcome of a clarification reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ClarificationOutcome {
    /// The user said yes; the suggested activity was learned or reconfirmed.
    Confirmed { activity: String, alias_key: String },
    /// The user named a different activity with enough confidence.
    Corrected {
        activity: String,
        alias_key: String,
        confidence: f64,
    },
    /// A bare "no".
    RejectedNoRemainder,
    /// The correction was not recognised confidently.
    LowConfidence { confidence: f64 },
    /// Neither yes nor no.
    Ambiguous,
    /// The prompt was not a disambiguation question.
    NotClarification,
}

impl ClarificationOutcome {
    pub fn handled(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::Corrected { .. })
    }

    pub fn action(&self) -> Option<ClarificationAction> {
        match self {
            Self::Confirmed { .. } => Some(ClarificationAction::Confirmed),
            Self::Corrected { .. } => Some(ClarificationAction::Corrected),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<ClarificationReason> {
        match self {
            Self::Confirmed { .. } | Self::Corrected { .. } => None,
            Self::RejectedNoRemainder => Some(ClarificationReason::RejectedNoRemainder),
            Self::LowConfidence { .. } => Some(ClarificationReason::LowConfidence),
            Self::Ambiguous => Some(ClarificationReason::Ambiguous),
            Self::NotClarification => Some(ClarificationReason::NotClarification),
        }
    }

    pub fn activity(&self) -> Option<&str> {
        match self {
            Self::Confirmed { activity, .. } | Self::Corrected { activity, .. } => Some(activity),
            _ => None,
        }
    }

    /// Whether the alias vocabulary was written.
    pub fn mutated_vocabulary(&self) -> bool {
        self.handled()
    }

    pub fn report(&self) -> ClarificationReport {
        ClarificationReport {
            handled: self.handled(),
            action: self.action(),
            activity: self.activity().map(str::to_string),
            reason: self.reason(),
        }
    }
}

/// Flat, serializable view of an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationReport {
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ClarificationAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ClarificationReason>,
}

/// Handles replies to disambiguation questions.
pub struct ClarificationClassifier {
    aliases: Arc<AliasStore>,
    classifier: Arc<dyn Classifier>,
    key_source: AliasKeySource,
    config: ClarificationConfig,
}

impl ClarificationClassifier {
    pub fn new(
        aliases: Arc<AliasStore>,
        classifier: Arc<dyn Classifier>,
        key_source: AliasKeySource,
        config: ClarificationConfig,
    ) -> Self {
        Self {
            aliases,
            classifier,
            key_source,
            config,
        }
    }

    /// Classify a reply to `prompt` within `scope_id`, learning vocabulary
    /// when the reply is an explicit confirmation or a confident correction.
    pub async fn handle_reply(
        &self,
        scope_id: &str,
        prompt: &PromptRef,
        reply_text: &str,
    ) -> HearthResult<ClarificationOutcome> {
        let Some(suggested) = suggested_activity(&prompt.prompt_text) else {
            return Ok(ClarificationOutcome::NotClarification);
        };

        let reply = normalize_reply(reply_text);
        let original = prompt.original_term.as_deref();

        if is_affirmative(&reply) {
            let alias_key = self.key_source.alias_key_for(original, &suggested).to_string();
            self.confirm(scope_id, &alias_key, &suggested).await?;
            info!(scope_id, %alias_key, activity = %suggested, "Clarification confirmed");
            return Ok(ClarificationOutcome::Confirmed {
                activity: suggested,
                alias_key,
            });
        }

        let Some(remainder) = strip_negation(&reply) else {
            debug!(scope_id, "Clarification reply ambiguous");
            return Ok(ClarificationOutcome::Ambiguous);
        };
        if remainder.is_empty() {
            debug!(scope_id, activity = %suggested, "Clarification rejected without correction");
            return Ok(ClarificationOutcome::RejectedNoRemainder);
        }

        let classification = classify_or_none(self.classifier.as_ref(), &remainder).await;
        let confidence = classification.confidence;
        let activity = classification
            .activity
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && !classification.is_none());

        match activity {
            Some(activity) if confidence >= self.config.correction_confidence_floor => {
                let alias_key = self.key_source.alias_key_for(original, activity).to_string();
                self.aliases.put_alias(scope_id, &alias_key, activity).await?;
                info!(scope_id, %alias_key, activity, confidence, "Clarification corrected");
                Ok(ClarificationOutcome::Corrected {
                    activity: activity.to_string(),
                    alias_key,
                    confidence,
                })
            }
            _ => {
                debug!(scope_id, confidence, "Correction below confidence floor");
                Ok(ClarificationOutcome::LowConfidence { confidence })
            }
        }
    }

    async fn confirm(&self, scope_id: &str, alias_key: &str, activity: &str) -> HearthResult<()> {
        match self.aliases.get_alias(scope_id, alias_key).await? {
            Some(existing) if existing.canonical_activity == activity => {
                match self.aliases.increment_confirmation(scope_id, alias_key).await? {
                    ConfirmationUpdate::Incremented(n) => {
                        debug!(scope_id, alias_key, confirmations = n, "Alias reconfirmed")
                    }
                    ConfirmationUpdate::Missing => {
                        self.aliases.put_alias(scope_id, alias_key, activity).await?;
                    }
                    ConfirmationUpdate::Conflict => {}
                }
            }
            _ => {
                self.aliases.put_alias(scope_id, alias_key, activity).await?;
            }
        }
        Ok(())
    }
}
