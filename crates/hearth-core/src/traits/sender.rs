//! Downstream send channel trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HearthResult;
use crate::routing::Destination;

/// A message ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Where the message goes.
    pub destination: Destination,
    /// Conversation the message concerns.
    pub conversation_id: String,
    /// Person the message concerns; the recipient for private destinations.
    pub recipient_id: String,
    /// Message text.
    pub text: String,
    /// Transport thread reference, if replying in a thread.
    pub thread_ref: Option<String>,
}

/// Outbound transport. Failures are logged by callers, never retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver a message.
    async fn send(&self, message: &OutboundMessage) -> HearthResult<()>;
}
