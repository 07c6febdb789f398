//! Channel routing for outbound content.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::ConversationKind;

/// Kind of outbound content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Short neutral acknowledgment of a reported activity.
    Acknowledgment,
    /// Disambiguation question.
    Clarification,
    /// Answer to a direct query.
    QueryResult,
    /// Proactive suggestion derived from learned behavior.
    AdaptationHint,
}

impl ContentType {
    /// Content the user did not directly ask for.
    pub fn is_unsolicited(self) -> bool {
        matches!(self, ContentType::AdaptationHint)
    }
}

/// Where a message should be delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// The multi-party conversation the event came from.
    Group,
    /// A one-to-one conversation with the subject.
    Private,
    /// Do not send.
    None,
}

/// Pick the destination for a piece of content.
///
/// Private contexts always stay private. Unsolicited content never lands in
/// a group; it goes private only for opted-in subjects.
pub fn route(content_type: ContentType, is_opted_in: bool, conversation_kind: ConversationKind) -> Destination {
    if conversation_kind == ConversationKind::Private {
        return Destination::Private;
    }
    if content_type.is_unsolicited() {
        return if is_opted_in {
            Destination::Private
        } else {
            Destination::None
        };
    }
    Destination::Group
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ContentType; 4] = [
        ContentType::Acknowledgment,
        ContentType::Clarification,
        ContentType::QueryResult,
        ContentType::AdaptationHint,
    ];

    #[test]
    fn test_adaptation_hint_requires_opt_in() {
        assert_eq!(
            route(ContentType::AdaptationHint, false, ConversationKind::Group),
            Destination::None
        );
        assert_eq!(
            route(ContentType::AdaptationHint, true, ConversationKind::Group),
            Destination::Private
        );
    }

    #[test]
    fn test_private_context_is_always_private() {
        for content in ALL {
            for opted_in in [false, true] {
                assert_eq!(
                    route(content, opted_in, ConversationKind::Private),
                    Destination::Private
                );
            }
        }
    }

    #[test]
    fn test_solicited_content_stays_in_group() {
        for content in [
            ContentType::Acknowledgment,
            ContentType::Clarification,
            ContentType::QueryResult,
        ] {
            assert_eq!(route(content, false, ConversationKind::Group), Destination::Group);
            assert_eq!(route(content, true, ConversationKind::Group), Destination::Group);
        }
    }
}
