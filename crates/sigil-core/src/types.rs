// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the transport, dispatcher and conversation flows.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Character the daemon substitutes into message text for each mention.
pub const MENTION_PLACEHOLDER: char = '\u{FFFC}';

/// Opaque identifier of a chat participant (account uuid, else phone number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a message was posted: a group, or a one-to-one chat with a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ConversationId {
    Group(String),
    Direct(ActorId),
}

impl ConversationId {
    pub fn is_group(&self) -> bool {
        matches!(self, ConversationId::Group(_))
    }

    /// Returns the group id for group conversations.
    pub fn group_id(&self) -> Option<&str> {
        match self {
            ConversationId::Group(id) => Some(id),
            ConversationId::Direct(_) => None,
        }
    }

    /// Stable string key used by the conversation-state maps.
    pub fn key(&self) -> String {
        match self {
            ConversationId::Group(id) => format!("group:{id}"),
            ConversationId::Direct(peer) => format!("direct:{peer}"),
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// The author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: ActorId,
    pub number: Option<String>,
    pub display_name: Option<String>,
}

impl Sender {
    /// Whether `candidate` names this sender by id or by phone number.
    pub fn matches(&self, candidate: &str) -> bool {
        self.id.as_str() == candidate || self.number.as_deref() == Some(candidate)
    }

    /// Best human-readable label for the sender.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.number.as_deref())
            .unwrap_or(self.id.as_str())
    }

    /// Address to use when sending to this sender directly.
    pub fn address(&self) -> &str {
        self.number.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Metadata about an attachment carried by a message or a quote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Option<String>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
    pub size: Option<u64>,
}

/// A mention of another participant inside message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub actor: ActorId,
    pub number: Option<String>,
    pub name: Option<String>,
    pub start: u32,
    pub length: u32,
}

/// The message an inbound message replies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRef {
    pub timestamp: i64,
    pub author: Option<ActorId>,
    pub author_number: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// The account the bot runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub number: String,
    pub uuid: Option<String>,
}

impl BotIdentity {
    pub fn new(number: impl Into<String>, uuid: Option<String>) -> Self {
        Self {
            number: number.into(),
            uuid,
        }
    }

    /// Whether `candidate` (a uuid or a phone number) is the bot itself.
    pub fn is_self(&self, candidate: &str) -> bool {
        !candidate.is_empty()
            && (candidate == self.number || self.uuid.as_deref() == Some(candidate))
    }
}

/// A normalized inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub conversation: ConversationId,
    pub text: String,
    pub timestamp: i64,
    pub reply_to: Option<QuoteRef>,
    pub attachments: Vec<Attachment>,
    pub mentions: Vec<Mention>,
}

impl Message {
    pub fn is_group(&self) -> bool {
        self.conversation.is_group()
    }

    /// Whether this message quotes (replies to) a message written by the bot.
    pub fn quotes_identity(&self, bot: &BotIdentity) -> bool {
        self.reply_to.as_ref().is_some_and(|quote| {
            quote.author.as_ref().is_some_and(|a| bot.is_self(a.as_str()))
                || quote.author_number.as_deref().is_some_and(|n| bot.is_self(n))
        })
    }

    /// Whether the bot is @-mentioned in this message.
    pub fn mentions_identity(&self, bot: &BotIdentity) -> bool {
        self.mentions.iter().any(|m| {
            bot.is_self(m.actor.as_str()) || m.number.as_deref().is_some_and(|n| bot.is_self(n))
        })
    }

    /// Message text with mention placeholders removed and whitespace collapsed.
    pub fn plain_text(&self) -> String {
        self.text
            .replace(MENTION_PLACEHOLDER, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A normalized emoji reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub target_timestamp: i64,
    pub target_author: Option<ActorId>,
    pub target_author_number: Option<String>,
    pub conversation: ConversationId,
    pub actor: ActorId,
    pub actor_number: Option<String>,
    pub is_remove: bool,
    pub timestamp: i64,
}

impl Reaction {
    /// Whether the reacted-to message was written by the bot.
    pub fn targets_identity(&self, bot: &BotIdentity) -> bool {
        self.target_author
            .as_ref()
            .is_some_and(|a| bot.is_self(a.as_str()))
            || self
                .target_author_number
                .as_deref()
                .is_some_and(|n| bot.is_self(n))
    }
}

/// Everything the normalizer can produce from a push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(Message),
    Reaction(Reaction),
}

impl Inbound {
    pub fn conversation(&self) -> &ConversationId {
        match self {
            Inbound::Message(m) => &m.conversation,
            Inbound::Reaction(r) => &r.conversation,
        }
    }

    pub fn actor(&self) -> &ActorId {
        match self {
            Inbound::Message(m) => &m.sender.id,
            Inbound::Reaction(r) => &r.actor,
        }
    }
}

/// Quote metadata attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundQuote {
    pub timestamp: i64,
    pub author: String,
    pub text: Option<String>,
}

/// A message the bot sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub conversation: ConversationId,
    pub text: String,
    pub quote: Option<OutboundQuote>,
    /// Local file paths handed to the daemon as attachments.
    pub attachments: Vec<String>,
}

impl OutboundMessage {
    pub fn new(conversation: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation,
            text: text.into(),
            quote: None,
            attachments: Vec::new(),
        }
    }

    /// A reply into the conversation `original` came from, quoting it.
    ///
    /// Group messages are answered in the group; direct messages are
    /// answered directly to the sender.
    pub fn reply(original: &Message, text: impl Into<String>) -> Self {
        Self {
            conversation: original.conversation.clone(),
            text: text.into(),
            quote: Some(OutboundQuote {
                timestamp: original.timestamp,
                author: original.sender.address().to_string(),
                text: Some(original.text.clone()),
            }),
            attachments: Vec::new(),
        }
    }
}

/// Membership changes applied through the daemon's group management.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub add_members: Vec<String>,
    pub remove_members: Vec<String>,
}

impl GroupUpdate {
    pub fn add(members: impl IntoIterator<Item = String>) -> Self {
        Self {
            add_members: members.into_iter().collect(),
            remove_members: Vec::new(),
        }
    }

    pub fn remove(members: impl IntoIterator<Item = String>) -> Self {
        Self {
            add_members: Vec::new(),
            remove_members: members.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add_members.is_empty() && self.remove_members.is_empty()
    }
}

/// A group as reported by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub name: Option<String>,
    /// Member identifiers (numbers and/or uuids).
    pub members: Vec<String>,
    /// Admin identifiers (numbers and/or uuids).
    pub admins: Vec<String>,
}

impl GroupInfo {
    pub fn has_admin(&self, candidate: &str) -> bool {
        self.admins.iter().any(|a| a == candidate)
    }
}

/// Outcome of a send request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Server timestamp of the sent message. `None` when the daemon never
    /// acknowledged and the send was accepted by timeout tolerance.
    pub timestamp: Option<i64>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Which AI backend answers a conversation thread.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ProviderTag {
    #[strum(serialize = "openai")]
    OpenAi,
    #[strum(serialize = "claude")]
    Claude,
}

/// Speaker of a previous turn in an AI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One previous exchange line fed back to an AI provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A completion request handed to an [`AiProvider`](crate::AiProvider).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiRequest {
    pub prompt: String,
    pub history: Vec<AiTurn>,
    /// Text of the message the user quoted, if any.
    pub quoted: Option<String>,
    /// Display label of the person asking.
    pub requester: Option<String>,
}

/// A confirmed event handed to the [`EventSink`](crate::EventSink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// IANA time zone the event was described in.
    pub timezone: String,
    pub location: String,
    pub description: Option<String>,
    pub organizer: ActorId,
    pub conversation: ConversationId,
}

/// One command execution, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub command: String,
    pub actor: ActorId,
    pub conversation: String,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}
