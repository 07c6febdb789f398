//! Classification collaborator trait and output parsing.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ErrorCode, HearthError, HearthResult};
use crate::types::Classification;

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid regex"));

/// Natural-language classifier, typically LLM-backed.
///
/// Also reused for correction extraction on the remainder of a
/// clarification reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a piece of text.
    async fn classify(&self, text: &str) -> HearthResult<Classification>;
}

/// Classify, degrading any failure to [`Classification::none`].
pub async fn classify_or_none(classifier: &dyn Classifier, text: &str) -> Classification {
    match classifier.classify(text).await {
        Ok(classification) => classification,
        Err(e) => {
            tracing::warn!(error = %e, "Classification failed, treating as none");
            Classification::none()
        }
    }
}

/// Parse raw classifier output, tolerating fenced JSON.
pub fn parse_classification(raw: &str) -> HearthResult<Classification> {
    let text = raw.trim();
    let json = CODE_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);

    if json.is_empty() {
        return Ok(Classification::none());
    }

    let parsed: Classification = serde_json::from_str(json).map_err(|e| HearthError::Classification {
        message: format!("Failed to parse classification JSON: {}", e),
        code: ErrorCode::ClsInvalidResponse,
    })?;

    if !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(HearthError::Classification {
            message: format!("confidence {} outside [0, 1]", parsed.confidence),
            code: ErrorCode::ClsInvalidResponse,
        });
    }

    Ok(parsed)
}
