//! Per-event orchestration.
//!
//! One call per inbound event, no intra-event parallelism. Clarification
//! replies are tried first; when one is handled it replaces normal
//! processing for that event. Otherwise text is alias-resolved, classified,
//! fed to the trackers (best-effort), run through the response policy,
//! routed and sent. Responses are recorded in the ledger only after a
//! successful send.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alias::{AliasResolver, AliasStore, AppliedAlias};
use crate::clarify::{ClarificationClassifier, ClarificationOutcome};
use crate::config::HearthConfig;
use crate::error::{HearthError, HearthResult};
use crate::policy::{
    LedgerStore, PatternContentPolicy, PolicyDecision, ResponsePolicyEngine, SuppressionReason,
};
use crate::routing::{route, Destination};
use crate::tracking::{EmaPreferenceSource, EmaTracker, EmaUpdate, PatternTracker, PreferenceSource};
use crate::traits::{
    classify_or_none, Classifier, ContentPolicy, KeyValueStore, MessageSender, OutboundMessage,
};
use crate::types::{ClassificationType, ClassifiedEvent, InboundMessage};

/// Upper bound on recent inbound messages kept per conversation.
const LEDGER_MAX_RECENT: usize = 50;

/// What happened to an outbound candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "delivery", content = "destination", rename_all = "snake_case")]
pub enum Delivery {
    /// Policy decided not to respond.
    NotAttempted,
    /// Routing found no acceptable destination.
    Unroutable,
    Sent(Destination),
    Failed(Destination),
}

/// Result of processing one classified event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEvent {
    pub event: ClassifiedEvent,
    pub applied_aliases: Vec<AppliedAlias>,
    /// `None` when the policy inputs could not be read.
    pub decision: Option<PolicyDecision>,
    pub delivery: Delivery,
}

/// Result of handling one inbound event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    /// A clarification reply was handled; normal processing skipped.
    Clarification(ClarificationOutcome),
    Processed(ProcessedEvent),
}

/// Wires the components together for a single event.
pub struct EventPipeline {
    resolver: Arc<AliasResolver>,
    clarifier: Option<ClarificationClassifier>,
    classifier: Option<Arc<dyn Classifier>>,
    ema: Arc<EmaTracker>,
    patterns: PatternTracker,
    ledger: Arc<LedgerStore>,
    policy: ResponsePolicyEngine,
    sender: Option<Arc<dyn MessageSender>>,
}

impl EventPipeline {
    pub fn builder(config: HearthConfig, store: Arc<dyn KeyValueStore>) -> EventPipelineBuilder {
        EventPipelineBuilder {
            config,
            store,
            classifier: None,
            sender: None,
            content_policy: None,
            preferences: PreferenceMode::Disabled,
        }
    }

    /// The EMA tracker, for callers deriving their own signals.
    pub fn ema(&self) -> &EmaTracker {
        &self.ema
    }

    /// Handle a raw inbound message.
    pub async fn handle_message(&self, message: &InboundMessage) -> HearthResult<EventOutcome> {
        self.note_inbound(&message.conversation_id, &message.sender_id, message.occurred_at)
            .await;

        if let Some(prompt) = &message.reply_to {
            let clarifier = self
                .clarifier
                .as_ref()
                .ok_or_else(|| HearthError::missing_collaborator("classifier"))?;
            let outcome = clarifier
                .handle_reply(&message.conversation_id, prompt, &message.text)
                .await?;
            if outcome.mutated_vocabulary() {
                self.resolver.invalidate(&message.conversation_id).await;
            }
            if outcome.handled() {
                return Ok(EventOutcome::Clarification(outcome));
            }
            debug!(
                conversation_id = %message.conversation_id,
                reason = ?outcome.reason(),
                "Reply not handled as clarification"
            );
        }

        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| HearthError::missing_collaborator("classifier"))?;

        let (text, applied_aliases) = match self
            .resolver
            .resolve_aliases(&message.conversation_id, &message.text)
            .await
        {
            Ok(resolution) => (resolution.resolved_text, resolution.applied_aliases),
            Err(e) => {
                warn!(error = %e, "Alias resolution failed, classifying raw text");
                (message.text.clone(), Vec::new())
            }
        };

        let classification = classify_or_none(classifier.as_ref(), &text).await;
        let event = ClassifiedEvent::from_message(message, &classification);
        let processed = self.process(event, applied_aliases).await?;
        Ok(EventOutcome::Processed(processed))
    }

    /// Handle an event that was classified upstream.
    pub async fn handle_classified(&self, event: &ClassifiedEvent) -> HearthResult<ProcessedEvent> {
        self.note_inbound(&event.conversation_id, &event.subject_id, event.occurred_at)
            .await;
        self.process(event.clone(), Vec::new()).await
    }

    /// Fold an externally derived "message was ignored" signal into the ignore-rate.
    pub async fn record_ignore_signal(&self, subject_id: &str, ignored: bool) -> HearthResult<EmaUpdate> {
        self.ema.record_ignore(subject_id, ignored).await
    }

    /// Fold a completed period's interaction count into the interaction frequency.
    pub async fn record_interaction_period(
        &self,
        subject_id: &str,
        period_key: &str,
        count: f64,
    ) -> HearthResult<EmaUpdate> {
        self.ema
            .record_interaction_frequency(subject_id, period_key, count)
            .await
    }

    async fn note_inbound(&self, conversation_id: &str, sender_id: &str, at: DateTime<Utc>) {
        if let Err(e) = self
            .ledger
            .record_inbound(conversation_id, sender_id, at)
            .await
        {
            warn!(conversation_id, error = %e, "Failed to record inbound message");
        }
    }

    async fn process(
        &self,
        event: ClassifiedEvent,
        applied_aliases: Vec<AppliedAlias>,
    ) -> HearthResult<ProcessedEvent> {
        if event.kind == ClassificationType::None {
            return Ok(ProcessedEvent {
                event,
                applied_aliases,
                decision: Some(PolicyDecision::Suppress {
                    reason: SuppressionReason::None,
                }),
                delivery: Delivery::NotAttempted,
            });
        }

        self.update_trackers(&event).await;

        let decision = match self.policy.evaluate(&event).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(conversation_id = %event.conversation_id, error = %e, "Policy evaluation failed");
                return Ok(ProcessedEvent {
                    event,
                    applied_aliases,
                    decision: None,
                    delivery: Delivery::NotAttempted,
                });
            }
        };

        let delivery = match &decision {
            PolicyDecision::Suppress { reason } => {
                debug!(conversation_id = %event.conversation_id, %reason, "No response");
                Delivery::NotAttempted
            }
            PolicyDecision::Respond { text, content_type } => {
                let destination = route(*content_type, event.is_opted_in, event.conversation_kind);
                if destination == Destination::None {
                    debug!(conversation_id = %event.conversation_id, %content_type, "No destination");
                    Delivery::Unroutable
                } else {
                    self.deliver(&event, destination, text).await?
                }
            }
        };

        Ok(ProcessedEvent {
            event,
            applied_aliases,
            decision: Some(decision),
            delivery,
        })
    }

    /// Trackers are independent: a failure in one never blocks the other.
    async fn update_trackers(&self, event: &ClassifiedEvent) {
        let Some(activity) = event.activity_key.as_deref().filter(|a| !a.is_empty()) else {
            return;
        };

        if let Some(effort) = event.effort {
            if let Err(e) = self.ema.record_effort(&event.subject_id, activity, effort).await {
                warn!(subject_id = %event.subject_id, activity, error = %e, "Effort tracking failed");
            }
        }

        if let Err(e) = self
            .patterns
            .record_occurrence(&event.conversation_id, &event.subject_id, activity, event.occurred_at)
            .await
        {
            warn!(subject_id = %event.subject_id, activity, error = %e, "Pattern tracking failed");
        }
    }

    async fn deliver(
        &self,
        event: &ClassifiedEvent,
        destination: Destination,
        text: &str,
    ) -> HearthResult<Delivery> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| HearthError::missing_collaborator("sender"))?;

        let message = OutboundMessage {
            destination,
            conversation_id: event.conversation_id.clone(),
            recipient_id: event.subject_id.clone(),
            text: text.to_string(),
            thread_ref: None,
        };

        match sender.send(&message).await {
            Ok(()) => {
                info!(conversation_id = %event.conversation_id, %destination, "Response sent");
                if let Err(e) = self
                    .ledger
                    .record_response(&event.conversation_id, event.occurred_at)
                    .await
                {
                    warn!(conversation_id = %event.conversation_id, error = %e, "Failed to record response");
                }
                Ok(Delivery::Sent(destination))
            }
            Err(e) => {
                error!(conversation_id = %event.conversation_id, %destination, error = %e, "Send failed");
                Ok(Delivery::Failed(destination))
            }
        }
    }
}

enum PreferenceMode {
    Disabled,
    Tracked,
    Custom(Arc<dyn PreferenceSource>),
}

/// Builder for [`EventPipeline`].
pub struct EventPipelineBuilder {
    config: HearthConfig,
    store: Arc<dyn KeyValueStore>,
    classifier: Option<Arc<dyn Classifier>>,
    sender: Option<Arc<dyn MessageSender>>,
    content_policy: Option<Arc<dyn ContentPolicy>>,
    preferences: PreferenceMode,
}

impl EventPipelineBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Replace the default [`PatternContentPolicy`].
    pub fn content_policy(mut self, policy: Arc<dyn ContentPolicy>) -> Self {
        self.content_policy = Some(policy);
        self
    }

    /// Suppress using the pipeline's own EMA statistics.
    pub fn tracked_preferences(mut self) -> Self {
        self.preferences = PreferenceMode::Tracked;
        self
    }

    pub fn preferences(mut self, source: Arc<dyn PreferenceSource>) -> Self {
        self.preferences = PreferenceMode::Custom(source);
        self
    }

    pub fn build(self) -> HearthResult<EventPipeline> {
        let config = self.config;
        config.validate()?;
        let tz = config.tz()?;
        let store = self.store;

        let ema = Arc::new(EmaTracker::new(store.clone(), config.ema.clone()));
        let aliases = Arc::new(AliasStore::new(store.clone(), config.alias.max_scope_entries));
        let resolver = Arc::new(AliasResolver::new(aliases.clone(), config.alias.cache_ttl()));

        let retention = config.policy.fast_conversation_window().max(Duration::minutes(10));
        let ledger = Arc::new(LedgerStore::new(store.clone(), tz, retention, LEDGER_MAX_RECENT));

        let content_policy: Arc<dyn ContentPolicy> = match self.content_policy {
            Some(policy) => policy,
            None => Arc::new(PatternContentPolicy::new()),
        };
        let mut policy =
            ResponsePolicyEngine::new(config.policy.clone(), tz, ledger.clone(), content_policy);
        policy = match self.preferences {
            PreferenceMode::Disabled => policy,
            PreferenceMode::Tracked => policy.with_preferences(Arc::new(EmaPreferenceSource::new(ema.clone()))),
            PreferenceMode::Custom(source) => policy.with_preferences(source),
        };

        let clarifier = self.classifier.as_ref().map(|classifier| {
            ClarificationClassifier::new(
                aliases.clone(),
                classifier.clone(),
                config.alias.key_source,
                config.clarification.clone(),
            )
        });

        debug!(
            backend = store.backend_name(),
            timezone = %tz,
            classifier = self.classifier.is_some(),
            sender = self.sender.is_some(),
            "Event pipeline built"
        );

        Ok(EventPipeline {
            resolver,
            clarifier,
            classifier: self.classifier,
            ema,
            patterns: PatternTracker::new(store, tz),
            ledger,
            policy,
            sender: self.sender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyConfig;
    use crate::stores::MemoryStore;
    use crate::traits::MockMessageSender;
    use crate::types::{ConversationKind, EffortLevel};
    use chrono::TimeZone;

    fn event(at: DateTime<Utc>) -> ClassifiedEvent {
        ClassifiedEvent {
            conversation_id: "kitchen".to_string(),
            subject_id: "alex".to_string(),
            kind: ClassificationType::Activity,
            activity_key: Some("washing-up".to_string()),
            confidence: 0.9,
            effort: Some(EffortLevel::Medium),
            raw_text: "did the dishes".to_string(),
            is_direct_address: false,
            occurred_at: at,
            conversation_kind: ConversationKind::Group,
            is_opted_in: false,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    fn pipeline(sender: MockMessageSender) -> EventPipeline {
        EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
            .sender(Arc::new(sender))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sent_response_starts_cooldown() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send()
            .withf(|m| {
                m.destination == Destination::Group
                    && m.conversation_id == "kitchen"
                    && m.text == "Noted, washing-up."
            })
            .times(1)
            .returning(|_| Ok(()));
        let pipeline = pipeline(sender);

        let first = pipeline.handle_classified(&event(noon())).await.unwrap();
        assert_eq!(first.delivery, Delivery::Sent(Destination::Group));

        let second = pipeline
            .handle_classified(&event(noon() + Duration::minutes(5)))
            .await
            .unwrap();
        assert_eq!(second.delivery, Delivery::NotAttempted);
        assert_eq!(
            second.decision.and_then(|d| d.reason()),
            Some(SuppressionReason::Cooldown)
        );
    }

    #[tokio::test]
    async fn test_send_error_is_reported_not_raised() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send()
            .times(2)
            .returning(|_| Err(HearthError::send("transport down")));
        let pipeline = pipeline(sender);

        for minutes in [0, 1] {
            let outcome = pipeline
                .handle_classified(&event(noon() + Duration::minutes(minutes)))
                .await
                .unwrap();
            assert_eq!(outcome.delivery, Delivery::Failed(Destination::Group));
        }
    }

    #[test]
    fn test_build_rejects_unbounded_policy_windows() {
        let config = HearthConfig {
            policy: PolicyConfig {
                cooldown_minutes: i64::MAX,
                ..PolicyConfig::default()
            },
            ..HearthConfig::default()
        };
        let mut sender = MockMessageSender::new();
        sender.expect_send().never();
        let result = EventPipeline::builder(config, Arc::new(MemoryStore::new()))
            .sender(Arc::new(sender))
            .build();
        assert!(matches!(result, Err(HearthError::Configuration(_))));
    }
}
