//! Inbound events and classification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Effort category reported by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

impl EffortLevel {
    /// Numeric encoding used by the effort EMA (low/medium/high → 1/2/3).
    pub fn encode(self) -> f64 {
        match self {
            EffortLevel::Low => 1.0,
            EffortLevel::Medium => 2.0,
            EffortLevel::High => 3.0,
        }
    }
}

/// Kind of message the classifier recognised.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClassificationType {
    /// Nothing actionable.
    #[default]
    None,
    /// A household activity was reported.
    Activity,
    /// A question about household activity.
    Query,
}

/// Output of the classification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type", default)]
    pub kind: ClassificationType,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub effort: Option<EffortLevel>,
}

impl Classification {
    /// The fallback result used whenever classification is unavailable.
    pub fn none() -> Self {
        Self {
            kind: ClassificationType::None,
            activity: None,
            confidence: 0.0,
            effort: None,
        }
    }

    /// An activity classification.
    pub fn activity(activity: impl Into<String>, confidence: f64, effort: Option<EffortLevel>) -> Self {
        Self {
            kind: ClassificationType::Activity,
            activity: Some(activity.into()),
            confidence,
            effort,
        }
    }

    /// True when nothing actionable was recognised.
    pub fn is_none(&self) -> bool {
        self.kind == ClassificationType::None
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::none()
    }
}

/// Whether a conversation is multi-party or one-to-one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    #[default]
    Group,
    Private,
}

/// A fully classified event, the unit the trackers and policy consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEvent {
    pub conversation_id: String,
    pub subject_id: String,
    #[serde(rename = "type", default = "default_event_type")]
    pub kind: ClassificationType,
    #[serde(default)]
    pub activity_key: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub effort: Option<EffortLevel>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub is_direct_address: bool,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub conversation_kind: ConversationKind,
    #[serde(default)]
    pub is_opted_in: bool,
}

fn default_event_type() -> ClassificationType {
    ClassificationType::Activity
}

impl ClassifiedEvent {
    /// Build an event from an inbound message and its classification.
    pub fn from_message(message: &InboundMessage, classification: &Classification) -> Self {
        Self {
            conversation_id: message.conversation_id.clone(),
            subject_id: message.sender_id.clone(),
            kind: classification.kind,
            activity_key: classification.activity.clone(),
            confidence: classification.confidence,
            effort: classification.effort,
            raw_text: message.text.clone(),
            is_direct_address: message.is_direct_address,
            occurred_at: message.occurred_at,
            conversation_kind: message.conversation_kind,
            is_opted_in: message.is_opted_in,
        }
    }
}

/// Reference to an earlier assistant prompt that a message replies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRef {
    /// Text of the prompt as it was sent.
    pub prompt_text: String,
    /// The user's original wording that triggered the prompt, if known.
    #[serde(default)]
    pub original_term: Option<String>,
    /// Transport thread reference for threaded replies.
    #[serde(default)]
    pub thread_ref: Option<String>,
}

/// A raw inbound chat message, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(default)]
    pub is_direct_address: bool,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub conversation_kind: ConversationKind,
    #[serde(default)]
    pub is_opted_in: bool,
    #[serde(default)]
    pub reply_to: Option<PromptRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effort_encoding() {
        assert_eq!(EffortLevel::Low.encode(), 1.0);
        assert_eq!(EffortLevel::Medium.encode(), 2.0);
        assert_eq!(EffortLevel::High.encode(), 3.0);
    }

    #[test]
    fn test_classified_event_from_json() {
        let json = r#"{
            "conversationId": "kitchen",
            "subjectId": "sam",
            "activityKey": "washing-up",
            "confidence": 0.9,
            "effort": "medium",
            "rawText": "did the dishes",
            "isDirectAddress": false,
            "occurredAt": "2026-03-01T18:30:00Z"
        }"#;
        let event: ClassifiedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, ClassificationType::Activity);
        assert_eq!(event.effort, Some(EffortLevel::Medium));
        assert_eq!(event.conversation_kind, ConversationKind::Group);
        assert!(!event.is_opted_in);
    }

    #[test]
    fn test_classification_type_parsing() {
        use std::str::FromStr;
        assert_eq!(
            ClassificationType::from_str("activity").unwrap(),
            ClassificationType::Activity
        );
        assert_eq!(ClassificationType::None.to_string(), "none");
    }
}
