//! hearth-core - Core library for hearth.
//!
//! This crate provides the adaptive learning and response-decision core of a
//! passive household chat assistant: smoothed behavioral statistics, habit
//! histograms, scoped alias vocabulary, clarification handling, the response
//! policy and channel routing.
//!
//! # Example
//!
//! ```ignore
//! use hearth_core::{EventPipeline, HearthConfig, MemoryStore};
//!
//! let pipeline = EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
//!     .classifier(classifier)
//!     .sender(sender)
//!     .tracked_preferences()
//!     .build()?;
//!
//! let outcome = pipeline.handle_message(&message).await?;
//! ```

pub mod alias;
pub mod clarify;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod routing;
pub mod stores;
pub mod time;
pub mod tracking;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use alias::{AliasConfig, AliasKeySource, AliasResolution, AliasResolver, AliasStore};
pub use clarify::{ClarificationClassifier, ClarificationConfig, ClarificationOutcome};
pub use config::HearthConfig;
pub use error::{HearthError, HearthResult};
pub use pipeline::{Delivery, EventOutcome, EventPipeline, ProcessedEvent};
pub use policy::{PolicyConfig, PolicyDecision, ResponsePolicyEngine, SuppressionReason};
pub use routing::{route, ContentType, Destination};
pub use stores::MemoryStore;
pub use tracking::{EmaTracker, PatternTracker, PreferenceSource};
pub use traits::{
    Classifier, ContentPolicy, KeyValueStore, MessageSender, OutboundMessage, StoreConfig,
    StoreItem, StoreKey, StoreProvider, WriteCondition,
};
pub use types::{ClassifiedEvent, Classification, InboundMessage};
