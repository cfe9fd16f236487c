use std::{collections::BTreeSet, fmt, sync::OnceLock};

use regex::Regex;
use serde::Deserialize;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

// Inbound payloads.

/// The outer envelope Slack posts to the events endpoint.
///
/// Every field is optional on the wire, so anything that is valid JSON object
/// deserializes; unknown envelope types fall through to the inert acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub token: Option<String>,
    pub challenge: Option<String>,
    pub event: Option<RawEvent>,
}

/// The `event` body of an `event_callback` envelope, as Slack sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub subtype: Option<String>,
    pub text: Option<String>,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
    pub bot_id: Option<String>,
}

/// The event types the relay distinguishes between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message,
    AppMention,
    UrlVerification,
    Other(String),
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "message" => EventKind::Message,
            "app_mention" => EventKind::AppMention,
            "url_verification" => EventKind::UrlVerification,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// A normalized inbound chat event.
///
/// Built once per request from a [`RawEvent`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub subtype: Option<String>,
    pub text: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub bot_id: Option<String>,
    /// Every `<@ID>` token found in `text`.
    pub mentioned_ids: BTreeSet<String>,
}

impl From<RawEvent> for InboundEvent {
    fn from(raw: RawEvent) -> Self {
        let text = raw.text.unwrap_or_default();
        let mentioned_ids = parse_mentions(&text);

        Self {
            kind: EventKind::from(raw.kind.as_str()),
            subtype: raw.subtype,
            text,
            user_id: raw.user.unwrap_or_default(),
            channel_id: raw.channel.filter(|c| !c.is_empty()),
            ts: raw.ts.unwrap_or_default(),
            thread_ts: raw.thread_ts,
            bot_id: raw.bot_id.filter(|b| !b.is_empty()),
            mentioned_ids,
        }
    }
}

impl InboundEvent {
    /// Whether the literal `<@user_id>` token appears in the text.
    pub fn mentions(&self, user_id: &str) -> bool {
        self.text.contains(&mention_token(user_id))
    }

    /// Whether the text mentions anyone besides `user_id`.
    pub fn mentions_other_than(&self, user_id: &str) -> bool {
        self.mentioned_ids.iter().any(|id| id != user_id)
    }
}

static MENTION_REGEX: OnceLock<Regex> = OnceLock::new();

fn mention_regex() -> &'static Regex {
    MENTION_REGEX.get_or_init(|| Regex::new(r"<@([A-Z0-9]+)>").unwrap())
}

/// Format the platform mention token for a user.
pub fn mention_token(user_id: &str) -> String {
    format!("<@{user_id}>")
}

/// Extract the user IDs of all `<@ID>` mention tokens in the text.
pub fn parse_mentions(text: &str) -> BTreeSet<String> {
    mention_regex().captures_iter(text).map(|c| c[1].to_string()).collect()
}

// Admission.

/// Everything the response generator needs, moved wholesale into the spawned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    pub user_input: String,
    pub user_id: String,
    pub channel_id: String,
    /// The thread the reply is posted under.
    pub thread_ts: String,
    /// The triggering message; compared against the thread's latest message before replying.
    pub message_ts: String,
}

/// Why an event was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DuplicateMention,
    UnsupportedEventType,
    Subtype,
    OwnMessage,
    BotMessage,
    NotAddressed,
    NotMyMention,
    NoChannel,
    FounderAddressedPeer,
    NotRelevant,
    AfterHours,
}

impl SkipReason {
    /// The short plain-text acknowledgement returned to Slack.
    pub fn ack(&self) -> &'static str {
        match self {
            SkipReason::DuplicateMention => "Duplicate mention",
            SkipReason::UnsupportedEventType => "Not a relevant event",
            SkipReason::Subtype => "Ignoring subtype",
            SkipReason::OwnMessage => "Ignoring own message",
            SkipReason::BotMessage => "Ignoring bot",
            SkipReason::NotAddressed => "Message not for this bot",
            SkipReason::NotMyMention => "Not my @mention",
            SkipReason::NoChannel => "No channel",
            SkipReason::FounderAddressedPeer => "Different bot tagged",
            SkipReason::NotRelevant => "Not relevant",
            SkipReason::AfterHours => "After hours",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::DuplicateMention => "plain message mentions this bot; the app_mention event handles it",
            SkipReason::UnsupportedEventType => "not a message or app_mention event",
            SkipReason::Subtype => "message has a subtype",
            SkipReason::OwnMessage => "message was posted by this bot",
            SkipReason::BotMessage => "message was posted by a bot",
            SkipReason::NotAddressed => "message does not mention anyone",
            SkipReason::NotMyMention => "app_mention does not mention this bot",
            SkipReason::NoChannel => "no channel to reply in",
            SkipReason::FounderAddressedPeer => "founder tagged a different bot",
            SkipReason::NotRelevant => "message is not relevant to this persona",
            SkipReason::AfterHours => "outside working hours",
        };

        f.write_str(reason)
    }
}

/// The outcome of the admission filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Respond(DispatchContext),
    Skip(SkipReason),
}

/// The terminal state of a response task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Responded,
    CooldownActive,
    MaxTurns,
    Superseded,
    Failed,
}

// Prompting.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// An ordered list of prompt messages sent to the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conversation {
    pub messages: Vec<PromptMessage>,
}

impl Conversation {
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(PromptMessage { role: PromptRole::System, content: content.into() });
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(PromptMessage { role: PromptRole::User, content: content.into() });
        self
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_mention_tokens() {
        let mentions = parse_mentions("<@U1> and <@B2X> but not <#C3> or <@lower>");

        assert_eq!(mentions.into_iter().collect::<Vec<_>>(), vec!["B2X".to_string(), "U1".to_string()]);
    }

    #[test]
    fn normalizes_app_mention_payload() {
        let envelope: EventEnvelope = serde_json::from_value(serde_json::json!({
            "type": "event_callback",
            "token": "tok",
            "event": {
                "type": "app_mention",
                "text": "<@UBOT> what's our liability here?",
                "user": "U123",
                "channel": "C1",
                "ts": "1700000000.000100",
                "event_ts": "1700000000.000100"
            }
        }))
        .unwrap();

        assert_eq!(envelope.kind, "event_callback");
        assert_eq!(envelope.token.as_deref(), Some("tok"));

        let event = InboundEvent::from(envelope.event.unwrap());

        assert_eq!(event.kind, EventKind::AppMention);
        assert_eq!(event.user_id, "U123");
        assert_eq!(event.channel_id.as_deref(), Some("C1"));
        assert_eq!(event.thread_ts, None);
        assert!(event.mentions("UBOT"));
        assert!(!event.mentions_other_than("UBOT"));
        assert!(event.mentions_other_than("UOTHER"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let event = InboundEvent::from(RawEvent { kind: "reaction_added".to_string(), ..Default::default() });

        assert_eq!(event.kind, EventKind::Other("reaction_added".to_string()));
        assert!(event.text.is_empty());
        assert!(event.mentioned_ids.is_empty());
        assert_eq!(event.bot_id, None);
    }

    #[test]
    fn conversation_preserves_order() {
        let conversation = Conversation::default().system("sys").user("hi");

        assert_eq!(conversation.messages[0].role, PromptRole::System);
        assert_eq!(conversation.messages[1], PromptMessage { role: PromptRole::User, content: "hi".to_string() });
    }
}
