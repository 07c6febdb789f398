//! Hard silence rules, evaluated in order.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::policy::engine::SuppressionReason;
use crate::policy::{ConversationSnapshot, PolicyConfig};
use crate::time::local_day_key;
use crate::types::ClassifiedEvent;

/// Everything a silence rule may look at.
pub struct RuleContext<'a> {
    pub event: &'a ClassifiedEvent,
    pub snapshot: &'a ConversationSnapshot,
    pub config: &'a PolicyConfig,
    pub timezone: Tz,
    pub now: DateTime<Utc>,
}

/// A check whose only effect, when it applies, is silence.
pub struct SilenceRule {
    pub reason: SuppressionReason,
    pub applies: fn(&RuleContext<'_>) -> bool,
}

/// Silence rules in evaluation order. Direct address bypasses only the last.
pub const SILENCE_RULES: [SilenceRule; 5] = [
    SilenceRule {
        reason: SuppressionReason::QuietHours,
        applies: in_quiet_hours,
    },
    SilenceRule {
        reason: SuppressionReason::DailyCap,
        applies: at_daily_cap,
    },
    SilenceRule {
        reason: SuppressionReason::FastConversation,
        applies: is_fast_conversation,
    },
    SilenceRule {
        reason: SuppressionReason::Cooldown,
        applies: in_cooldown,
    },
    SilenceRule {
        reason: SuppressionReason::LowConfidence,
        applies: below_clarify_floor,
    },
];

/// The first rule that applies, if any.
pub fn first_silence(ctx: &RuleContext<'_>) -> Option<SuppressionReason> {
    SILENCE_RULES
        .iter()
        .find(|rule| (rule.applies)(ctx))
        .map(|rule| rule.reason)
}

fn in_quiet_hours(ctx: &RuleContext<'_>) -> bool {
    let local = ctx.now.with_timezone(&ctx.timezone);
    ctx.config.quiet_hours.contains(local.time())
}

fn at_daily_cap(ctx: &RuleContext<'_>) -> bool {
    let today = local_day_key(ctx.now, ctx.timezone);
    ctx.snapshot.responses_on(&today) >= ctx.config.daily_cap
}

fn is_fast_conversation(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot
        .other_party_messages(&ctx.event.subject_id, ctx.now, ctx.config.fast_conversation_window())
        >= ctx.config.fast_conversation_messages
}

fn in_cooldown(ctx: &RuleContext<'_>) -> bool {
    ctx.snapshot
        .last_response_at
        .is_some_and(|last| ctx.now - last < ctx.config.cooldown())
}

fn below_clarify_floor(ctx: &RuleContext<'_>) -> bool {
    ctx.event.confidence < ctx.config.clarify_floor && !ctx.event.is_direct_address
}
