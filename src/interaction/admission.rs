//! Decides whether an inbound event deserves a reply from the persona.
//!
//! The gates run in a fixed order and the first one that fails wins.  Apart
//! from the thread bookkeeping in the middle of the chain, evaluation has no
//! side effects.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::{
    base::{
        persona::Persona,
        types::{Admission, DispatchContext, EventKind, InboundEvent, Res, SkipReason},
    },
    service::state::StateClient,
};

/// Run the admission gates for an event at time `now`.
#[instrument(skip_all, fields(kind = ?event.kind, ts = %event.ts, user = %event.user_id))]
pub async fn evaluate(event: &InboundEvent, persona: &Persona, state: &StateClient, now: DateTime<Utc>) -> Res<Admission> {
    let self_mentioned = event.mentions(&persona.self_id);
    let peer_mentioned = event.mentions_other_than(&persona.self_id);

    // A plain message that tags us is delivered again as an `app_mention`; only answer that one.
    if event.kind == EventKind::Message && self_mentioned {
        return Ok(Admission::Skip(SkipReason::DuplicateMention));
    }

    if !matches!(event.kind, EventKind::Message | EventKind::AppMention) {
        return Ok(Admission::Skip(SkipReason::UnsupportedEventType));
    }

    // Edits, joins, and the like.
    if event.subtype.is_some() {
        return Ok(Admission::Skip(SkipReason::Subtype));
    }

    // Our own replies come back as bot messages and must never pass the interbot exception.
    if !persona.is_founder(&event.user_id) && event.user_id == persona.self_id {
        return Ok(Admission::Skip(SkipReason::OwnMessage));
    }

    if event.bot_id.is_some() && !(persona.allow_interbot && peer_mentioned) {
        return Ok(Admission::Skip(SkipReason::BotMessage));
    }

    if persona.require_addressing && event.mentioned_ids.is_empty() {
        return Ok(Admission::Skip(SkipReason::NotAddressed));
    }

    if event.kind == EventKind::AppMention && !self_mentioned {
        return Ok(Admission::Skip(SkipReason::NotMyMention));
    }

    let Some(channel_id) = event.channel_id.clone().or_else(|| persona.default_channel_id.clone()) else {
        return Ok(Admission::Skip(SkipReason::NoChannel));
    };

    let thread_ts = state.resolve_thread_context(event).await?;
    state.record_last_message_time().await?;

    debug!("Resolved thread `{thread_ts}`.");

    let is_founder = persona.is_founder(&event.user_id);

    if is_founder && peer_mentioned && !event.mentioned_ids.contains(&persona.self_id) {
        return Ok(Admission::Skip(SkipReason::FounderAddressedPeer));
    }

    if !(is_founder || event.kind == EventKind::AppMention || persona.is_relevant(&event.text)) {
        return Ok(Admission::Skip(SkipReason::NotRelevant));
    }

    // The founder can reach the persona at any hour.
    if !is_founder && !persona.within_working_hours(now) {
        return Ok(Admission::Skip(SkipReason::AfterHours));
    }

    Ok(Admission::Respond(DispatchContext {
        user_input: event.text.clone(),
        user_id: event.user_id.clone(),
        channel_id,
        thread_ts,
        message_ts: event.ts.clone(),
    }))
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::base::{
        config::{Config, ConfigInner},
        types::RawEvent,
    };

    const SELF_ID: &str = "UBOT";
    const PEER_ID: &str = "UPEER";
    const FOUNDER_ID: &str = "UFOUNDER";

    fn config(require_addressing: bool) -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                founder_user_id: FOUNDER_ID.to_string(),
                persona_name: "avery".to_string(),
                persona_keywords: vec!["liability".to_string(), "contract".to_string()],
                working_hours_start: 9,
                working_hours_end: 18,
                working_hours_timezone: "America/New_York".to_string(),
                working_days: vec!["Mon".into(), "Tue".into(), "Wed".into(), "Thu".into(), "Fri".into()],
                allow_interbot: true,
                require_addressing,
                ..Default::default()
            }),
        }
    }

    fn persona() -> Persona {
        Persona::from_config(&config(true), SELF_ID).unwrap()
    }

    /// Wednesday 10:00 in New York.
    fn working_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 15, 0, 0).unwrap()
    }

    /// Saturday 23:00 in New York.
    fn after_hours() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 12, 4, 0, 0).unwrap()
    }

    fn event(kind: &str, user: &str, text: &str) -> InboundEvent {
        InboundEvent::from(RawEvent {
            kind: kind.to_string(),
            text: Some(text.to_string()),
            user: Some(user.to_string()),
            channel: Some("C1".to_string()),
            ts: Some("1700000000.000100".to_string()),
            ..Default::default()
        })
    }

    async fn run(event: &InboundEvent, persona: &Persona, now: DateTime<Utc>) -> Admission {
        let state = StateClient::surreal_memory().await.unwrap();
        evaluate(event, persona, &state, now).await.unwrap()
    }

    #[tokio::test]
    async fn app_mention_during_working_hours_is_admitted() {
        let event = event("app_mention", "U123", "<@UBOT> what's our liability here?");

        let Admission::Respond(context) = run(&event, &persona(), working_time()).await else {
            panic!("expected the event to be admitted");
        };

        assert_eq!(context.user_input, "<@UBOT> what's our liability here?");
        assert_eq!(context.user_id, "U123");
        assert_eq!(context.channel_id, "C1");
        assert_eq!(context.thread_ts, "1700000000.000100");
        assert_eq!(context.message_ts, "1700000000.000100");
    }

    #[tokio::test]
    async fn plain_message_mentioning_self_is_a_duplicate() {
        let persona = persona();

        // Even from the founder, during working hours, with a keyword.
        let event = event("message", FOUNDER_ID, "<@UBOT> contract question");

        assert_eq!(run(&event, &persona, working_time()).await, Admission::Skip(SkipReason::DuplicateMention));
    }

    #[tokio::test]
    async fn only_messages_and_mentions_are_considered() {
        let event = event("reaction_added", "U123", "<@UPEER> liability");

        assert_eq!(run(&event, &persona(), working_time()).await, Admission::Skip(SkipReason::UnsupportedEventType));
    }

    #[tokio::test]
    async fn subtypes_are_skipped() {
        let mut event = event("message", FOUNDER_ID, "<@UPEER> liability");
        event.subtype = Some("message_changed".to_string());

        assert_eq!(run(&event, &persona(), working_time()).await, Admission::Skip(SkipReason::Subtype));
    }

    #[tokio::test]
    async fn bot_messages_without_peer_mentions_are_skipped() {
        let persona = persona();

        let mut unaddressed = event("message", "U123", "liability everywhere");
        unaddressed.bot_id = Some("B1".to_string());

        let mut self_only = event("app_mention", "U123", "<@UBOT> liability");
        self_only.bot_id = Some("B1".to_string());

        assert_eq!(run(&unaddressed, &persona, working_time()).await, Admission::Skip(SkipReason::BotMessage));
        assert_eq!(run(&self_only, &persona, working_time()).await, Admission::Skip(SkipReason::BotMessage));
    }

    #[tokio::test]
    async fn bot_messages_mentioning_peers_can_pass() {
        let mut event = event("message", "U123", &format!("<@{PEER_ID}> what about the contract?"));
        event.bot_id = Some("B1".to_string());

        assert!(matches!(run(&event, &persona(), working_time()).await, Admission::Respond(_)));

        let mut strict = persona();
        strict.allow_interbot = false;

        assert_eq!(run(&event, &strict, working_time()).await, Admission::Skip(SkipReason::BotMessage));
    }

    #[tokio::test]
    async fn own_messages_are_skipped_even_when_mentioning_peers() {
        let persona = persona();

        let mut event = event("message", SELF_ID, &format!("<@{PEER_ID}> should review the contract."));
        event.bot_id = Some("BSELF".to_string());

        let state = StateClient::surreal_memory().await.unwrap();

        assert_eq!(evaluate(&event, &persona, &state, working_time()).await.unwrap(), Admission::Skip(SkipReason::OwnMessage));
        assert_eq!(state.latest_message_id(&event.ts).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unaddressed_messages_are_skipped() {
        let event = event("message", "U123", "lunch?");

        assert_eq!(run(&event, &persona(), working_time()).await, Admission::Skip(SkipReason::NotAddressed));
    }

    #[tokio::test]
    async fn unaddressed_keyword_messages_pass_when_addressing_is_not_required() {
        let persona = Persona::from_config(&config(false), SELF_ID).unwrap();

        let relevant = event("message", "U123", "who owns the liability?");
        let irrelevant = event("message", "U123", "lunch?");

        assert!(matches!(run(&relevant, &persona, working_time()).await, Admission::Respond(_)));
        assert_eq!(run(&irrelevant, &persona, working_time()).await, Admission::Skip(SkipReason::NotRelevant));
    }

    #[tokio::test]
    async fn app_mention_for_someone_else_is_skipped() {
        let event = event("app_mention", "U123", "<@UPEER> hello");

        assert_eq!(run(&event, &persona(), working_time()).await, Admission::Skip(SkipReason::NotMyMention));
    }

    #[tokio::test]
    async fn events_without_a_channel_use_the_default_channel() {
        let mut event = event("app_mention", "U123", "<@UBOT> hi");
        event.channel_id = None;

        let mut persona = persona();
        assert_eq!(run(&event, &persona, working_time()).await, Admission::Skip(SkipReason::NoChannel));

        persona.default_channel_id = Some("CDEFAULT".to_string());
        let Admission::Respond(context) = run(&event, &persona, working_time()).await else {
            panic!("expected the event to be admitted");
        };

        assert_eq!(context.channel_id, "CDEFAULT");
    }

    #[tokio::test]
    async fn founder_tagging_a_peer_is_left_to_the_peer() {
        let event = event("message", FOUNDER_ID, "<@UPEER> can you draft the contract?");

        assert_eq!(run(&event, &persona(), working_time()).await, Admission::Skip(SkipReason::FounderAddressedPeer));
    }

    #[tokio::test]
    async fn irrelevant_peer_messages_are_skipped() {
        let event = event("message", "U123", "<@UPEER> lunch?");

        assert_eq!(run(&event, &persona(), working_time()).await, Admission::Skip(SkipReason::NotRelevant));
    }

    #[tokio::test]
    async fn non_founders_are_ignored_after_hours() {
        let persona = persona();

        let keyword = event("message", "U123", "<@UPEER> is the contract signed?");
        let mention = event("app_mention", "U123", "<@UBOT> is the contract signed?");

        assert_eq!(run(&keyword, &persona, after_hours()).await, Admission::Skip(SkipReason::AfterHours));
        assert_eq!(run(&mention, &persona, after_hours()).await, Admission::Skip(SkipReason::AfterHours));
    }

    #[tokio::test]
    async fn founder_bypasses_working_hours() {
        let event = event("app_mention", FOUNDER_ID, "<@UBOT> thoughts?");

        assert!(matches!(run(&event, &persona(), after_hours()).await, Admission::Respond(_)));
    }

    #[tokio::test]
    async fn replies_resolve_to_their_thread_and_become_the_latest_message() {
        let state = StateClient::surreal_memory().await.unwrap();
        let persona = persona();

        let mut reply = event("app_mention", "U123", "<@UBOT> and the liability?");
        reply.ts = "1700000050.000200".to_string();
        reply.thread_ts = Some("1700000000.000100".to_string());

        let Admission::Respond(context) = evaluate(&reply, &persona, &state, working_time()).await.unwrap() else {
            panic!("expected the event to be admitted");
        };

        assert_eq!(context.thread_ts, "1700000000.000100");
        assert_eq!(context.message_ts, "1700000050.000200");
        assert_eq!(state.latest_message_id("1700000000.000100").await.unwrap().as_deref(), Some("1700000050.000200"));
        assert!(state.last_message_time().await.unwrap().is_some());
    }
}
