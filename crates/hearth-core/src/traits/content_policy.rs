//! Content policy checker trait.

use serde::{Deserialize, Serialize};

/// Outcome of a content check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PolicyVerdict {
    Valid,
    Invalid { reason: String },
}

impl PolicyVerdict {
    /// Whether the text passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, PolicyVerdict::Valid)
    }
}

/// Synchronous, pure check of outbound text.
pub trait ContentPolicy: Send + Sync {
    /// Check a candidate message.
    fn check(&self, text: &str) -> PolicyVerdict;
}
