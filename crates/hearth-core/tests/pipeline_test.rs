//! Integration tests for the event pipeline.
//!
//! Drives inbound messages and pre-classified events through the full
//! pipeline against the in-memory store, with hand-written collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hearth_core::clarify::ClarificationOutcome;
use hearth_core::tracking::EmaMetric;
use hearth_core::types::{ClassificationType, ConversationKind, EffortLevel, PromptRef};
use hearth_core::{
    Classification, ClassifiedEvent, Classifier, Delivery, Destination, EventOutcome,
    EventPipeline, HearthConfig, HearthError, HearthResult, InboundMessage, KeyValueStore,
    MemoryStore, MessageSender, OutboundMessage, PatternTracker, PolicyDecision, StoreItem,
    StoreKey, SuppressionReason, WriteCondition,
};

/// Returns the first rule whose needle occurs in the text.
struct KeywordClassifier {
    rules: Vec<(&'static str, Classification)>,
    seen: Mutex<Vec<String>>,
    fail: bool,
}

impl KeywordClassifier {
    fn new(rules: Vec<(&'static str, Classification)>) -> Self {
        Self {
            rules,
            seen: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> HearthResult<Classification> {
        self.seen.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(HearthError::classification("model unavailable"));
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle))
            .map(|(_, c)| c.clone())
            .unwrap_or_else(Classification::none))
    }
}

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    fail: bool,
}

impl RecordingSender {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> HearthResult<()> {
        if self.fail {
            return Err(HearthError::send("transport down"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Memory store that rejects writes to sort keys with a given prefix.
struct FailingWrites {
    inner: MemoryStore,
    sort_prefix: &'static str,
}

impl FailingWrites {
    fn new(sort_prefix: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            sort_prefix,
        }
    }
}

#[async_trait]
impl KeyValueStore for FailingWrites {
    async fn get(&self, key: &StoreKey) -> HearthResult<Option<StoreItem>> {
        self.inner.get(key).await
    }

    async fn put(&self, item: StoreItem, condition: WriteCondition) -> HearthResult<()> {
        if item.key.sort.starts_with(self.sort_prefix) {
            return Err(HearthError::store(format!("write rejected for {}", item.key.sort)));
        }
        self.inner.put(item, condition).await
    }

    async fn query_prefix(
        &self,
        partition: &str,
        sort_prefix: &str,
        limit: Option<usize>,
    ) -> HearthResult<Vec<StoreItem>> {
        self.inner.query_prefix(partition, sort_prefix, limit).await
    }

    async fn delete(&self, key: &StoreKey) -> HearthResult<()> {
        self.inner.delete(key).await
    }

    fn backend_name(&self) -> &str {
        "failing-writes"
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}

fn message(text: &str, at: DateTime<Utc>) -> InboundMessage {
    InboundMessage {
        message_id: format!("m-{}", at.timestamp()),
        conversation_id: "kitchen".to_string(),
        sender_id: "sam".to_string(),
        text: text.to_string(),
        is_direct_address: false,
        occurred_at: at,
        conversation_kind: ConversationKind::Group,
        is_opted_in: false,
        reply_to: None,
    }
}

fn classified(confidence: f64, at: DateTime<Utc>) -> ClassifiedEvent {
    ClassifiedEvent {
        conversation_id: "kitchen".to_string(),
        subject_id: "sam".to_string(),
        kind: ClassificationType::Activity,
        activity_key: Some("washing-up".to_string()),
        confidence,
        effort: Some(EffortLevel::Low),
        raw_text: "did the dishes".to_string(),
        is_direct_address: false,
        occurred_at: at,
        conversation_kind: ConversationKind::Group,
        is_opted_in: false,
    }
}

fn processed(outcome: EventOutcome) -> hearth_core::ProcessedEvent {
    match outcome {
        EventOutcome::Processed(p) => p,
        other => panic!("expected processed event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_message_is_resolved_classified_tracked_and_sent() {
    let store = Arc::new(MemoryStore::new());
    let classifier = Arc::new(KeywordClassifier::new(vec![(
        "washing-up",
        Classification::activity("washing-up", 0.9, Some(EffortLevel::Medium)),
    )]));
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), store.clone())
        .classifier(classifier.clone())
        .sender(sender.clone())
        .build()
        .unwrap();

    let outcome = processed(pipeline.handle_message(&message("did the dishes", noon())).await.unwrap());

    assert_eq!(classifier.seen(), vec!["did washing-up".to_string()]);
    assert_eq!(outcome.applied_aliases.len(), 1);
    assert_eq!(outcome.delivery, Delivery::Sent(Destination::Group));
    assert_eq!(sender.sent()[0].text, "Noted, washing-up.");

    let effort = pipeline
        .ema()
        .get("sam", &EmaMetric::Effort("washing-up".into()).metric_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(effort.value, 2.0);

    let habit = PatternTracker::new(store.clone(), chrono_tz::Europe::London)
        .get_habit("kitchen", "sam", "washing-up")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(habit.total_count, 1);
    assert_eq!(habit.hour_counts[12], 1);

    // Within the cooldown window nothing else is sent.
    let again = processed(
        pipeline
            .handle_message(&message("did the dishes again", noon() + Duration::minutes(5)))
            .await
            .unwrap(),
    );
    assert_eq!(
        again.decision.unwrap().reason(),
        Some(SuppressionReason::Cooldown)
    );
    assert_eq!(sender.sent().len(), 1);
}

#[tokio::test]
async fn test_correction_teaches_vocabulary() {
    let classifier = Arc::new(KeywordClassifier::new(vec![
        ("laundry", Classification::activity("laundry", 0.9, None)),
        ("wash", Classification::activity("washing-up", 0.6, None)),
    ]));
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
        .classifier(classifier.clone())
        .sender(sender.clone())
        .build()
        .unwrap();

    let first = processed(pipeline.handle_message(&message("did the wash", noon())).await.unwrap());
    assert_eq!(first.delivery, Delivery::Sent(Destination::Group));
    let prompt_text = sender.sent()[0].text.clone();
    assert_eq!(prompt_text, "Did you mean washing-up?");

    let mut reply = message("No, I meant laundry", noon() + Duration::minutes(1));
    reply.reply_to = Some(PromptRef {
        prompt_text,
        original_term: Some("the wash".to_string()),
        thread_ref: None,
    });
    match pipeline.handle_message(&reply).await.unwrap() {
        EventOutcome::Clarification(ClarificationOutcome::Corrected { activity, alias_key, .. }) => {
            assert_eq!(activity, "laundry");
            assert_eq!(alias_key, "the wash");
        }
        other => panic!("expected correction, got {:?}", other),
    }

    let later = processed(
        pipeline
            .handle_message(&message("did the wash", noon() + Duration::minutes(30)))
            .await
            .unwrap(),
    );
    assert_eq!(classifier.seen().last().unwrap(), "did laundry");
    assert_eq!(
        later.decision,
        Some(PolicyDecision::Respond {
            text: "Noted, laundry.".to_string(),
            content_type: hearth_core::ContentType::Acknowledgment,
        })
    );
}

#[tokio::test]
async fn test_unhandled_reply_falls_through_to_classification() {
    let classifier = Arc::new(KeywordClassifier::new(Vec::new()));
    let pipeline = EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
        .classifier(classifier.clone())
        .sender(Arc::new(RecordingSender::default()))
        .build()
        .unwrap();

    let mut reply = message("maybe", noon());
    reply.reply_to = Some(PromptRef {
        prompt_text: "Did you mean washing-up?".to_string(),
        original_term: None,
        thread_ref: None,
    });
    let outcome = processed(pipeline.handle_message(&reply).await.unwrap());
    assert_eq!(classifier.seen(), vec!["maybe".to_string()]);
    assert_eq!(outcome.decision.unwrap().reason(), Some(SuppressionReason::None));
}

#[tokio::test]
async fn test_missing_collaborators_fail_only_the_event() {
    let store = Arc::new(MemoryStore::new());
    let no_classifier = EventPipeline::builder(HearthConfig::default(), store.clone())
        .sender(Arc::new(RecordingSender::default()))
        .build()
        .unwrap();
    let err = no_classifier
        .handle_message(&message("did the dishes", noon()))
        .await
        .unwrap_err();
    assert!(matches!(err, HearthError::Configuration(_)));

    let no_sender = EventPipeline::builder(HearthConfig::default(), store)
        .build()
        .unwrap();
    let err = no_sender
        .handle_classified(&classified(0.9, noon()))
        .await
        .unwrap_err();
    assert!(matches!(err, HearthError::Configuration(_)));

    // Suppressed events never need a sender.
    let suppressed = no_sender
        .handle_classified(&classified(0.2, noon() + Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(suppressed.delivery, Delivery::NotAttempted);
}

#[tokio::test]
async fn test_effort_store_failure_does_not_block_habits() {
    let store = Arc::new(FailingWrites::new("EMA#"));
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), store.clone())
        .sender(sender.clone())
        .build()
        .unwrap();

    let outcome = pipeline.handle_classified(&classified(0.9, noon())).await.unwrap();
    assert_eq!(outcome.delivery, Delivery::Sent(Destination::Group));
    assert_eq!(sender.sent().len(), 1);

    let effort = pipeline
        .ema()
        .get("sam", &EmaMetric::Effort("washing-up".into()).metric_key())
        .await
        .unwrap();
    assert!(effort.is_none());

    let habit = PatternTracker::new(store, chrono_tz::Europe::London)
        .get_habit("kitchen", "sam", "washing-up")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(habit.total_count, 1);
}

#[tokio::test]
async fn test_habit_store_failure_does_not_block_effort() {
    let store = Arc::new(FailingWrites::new("HABIT#"));
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), store.clone())
        .sender(sender.clone())
        .build()
        .unwrap();

    let outcome = pipeline.handle_classified(&classified(0.9, noon())).await.unwrap();
    assert_eq!(outcome.delivery, Delivery::Sent(Destination::Group));

    let effort = pipeline
        .ema()
        .get("sam", &EmaMetric::Effort("washing-up".into()).metric_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(effort.value, 1.0);

    let habit = PatternTracker::new(store, chrono_tz::Europe::London)
        .get_habit("kitchen", "sam", "washing-up")
        .await
        .unwrap();
    assert!(habit.is_none());
}

#[tokio::test]
async fn test_failed_send_is_not_counted() {
    let pipeline = EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
        .sender(Arc::new(RecordingSender::failing()))
        .build()
        .unwrap();

    let first = pipeline.handle_classified(&classified(0.9, noon())).await.unwrap();
    assert_eq!(first.delivery, Delivery::Failed(Destination::Group));

    let second = pipeline
        .handle_classified(&classified(0.9, noon() + Duration::minutes(1)))
        .await
        .unwrap();
    assert!(second.decision.unwrap().should_respond());
}

#[tokio::test]
async fn test_classifier_failure_degrades_to_none() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), store.clone())
        .classifier(Arc::new(KeywordClassifier::failing()))
        .sender(sender.clone())
        .build()
        .unwrap();

    let outcome = processed(pipeline.handle_message(&message("did the dishes", noon())).await.unwrap());
    assert_eq!(outcome.event.kind, ClassificationType::None);
    assert_eq!(outcome.decision.unwrap().reason(), Some(SuppressionReason::None));
    assert!(sender.sent().is_empty());

    let habit = PatternTracker::new(store, chrono_tz::Europe::London)
        .get_habit("kitchen", "sam", "washing-up")
        .await
        .unwrap();
    assert!(habit.is_none());
}

#[tokio::test]
async fn test_private_conversation_routes_privately() {
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
        .sender(sender.clone())
        .build()
        .unwrap();

    let mut event = classified(0.9, noon());
    event.conversation_kind = ConversationKind::Private;
    let outcome = pipeline.handle_classified(&event).await.unwrap();
    assert_eq!(outcome.delivery, Delivery::Sent(Destination::Private));
    assert_eq!(sender.sent()[0].recipient_id, "sam");
}

#[tokio::test]
async fn test_tracked_ignore_rate_suppresses_acknowledgments() {
    let sender = Arc::new(RecordingSender::default());
    let pipeline = EventPipeline::builder(HearthConfig::default(), Arc::new(MemoryStore::new()))
        .sender(sender.clone())
        .tracked_preferences()
        .build()
        .unwrap();

    for _ in 0..10 {
        pipeline.record_ignore_signal("sam", true).await.unwrap();
    }

    let ack = pipeline.handle_classified(&classified(0.9, noon())).await.unwrap();
    assert_eq!(
        ack.decision.unwrap().reason(),
        Some(SuppressionReason::PreferenceSuppressed)
    );

    // Questions are governed by interaction frequency, which is unset.
    let question = pipeline
        .handle_classified(&classified(0.6, noon() + Duration::minutes(1)))
        .await
        .unwrap();
    assert_eq!(question.delivery, Delivery::Sent(Destination::Group));
    assert!(sender.sent()[0].text.starts_with("Did you mean"));
}

#[tokio::test]
async fn test_quiet_hours_in_household_timezone() {
    let config = HearthConfig::builder()
        .timezone("America/New_York")
        .build()
        .unwrap();
    let pipeline = EventPipeline::builder(config, Arc::new(MemoryStore::new()))
        .sender(Arc::new(RecordingSender::default()))
        .build()
        .unwrap();

    // 03:30 UTC is 22:30 the previous evening in New York.
    let late = Utc.with_ymd_and_hms(2026, 1, 16, 3, 30, 0).unwrap();
    let outcome = pipeline.handle_classified(&classified(0.9, late)).await.unwrap();
    assert_eq!(
        outcome.decision.unwrap().reason(),
        Some(SuppressionReason::QuietHours)
    );
}
