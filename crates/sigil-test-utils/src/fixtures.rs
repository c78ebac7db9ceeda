// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for normalized inbound messages and reactions.

use sigil_core::types::{Attachment, Mention, QuoteRef, Sender, MENTION_PLACEHOLDER};
use sigil_core::{ActorId, BotIdentity, ConversationId, Message, Reaction};

pub const BOT_NUMBER: &str = "+15550000000";
pub const BOT_UUID: &str = "bot-uuid";
pub const GROUP_ID: &str = "Z3JvdXAtMQ==";

/// The identity every fixture treats as the bot.
pub fn bot_identity() -> BotIdentity {
    BotIdentity::new(BOT_NUMBER, Some(BOT_UUID.to_string()))
}

/// Phone number derived from a short actor name, stable per name.
pub fn number_for(actor: &str) -> String {
    let digits: u32 = actor.bytes().map(u32::from).sum::<u32>() % 10_000;
    format!("+1555{digits:07}")
}

/// Fluent builder for [`Message`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// A group message from `alice` in [`GROUP_ID`].
    pub fn new(text: &str) -> Self {
        Self {
            message: Message {
                sender: Sender {
                    id: ActorId::new("alice"),
                    number: Some(number_for("alice")),
                    display_name: Some("Alice".into()),
                },
                conversation: ConversationId::Group(GROUP_ID.into()),
                text: text.to_string(),
                timestamp: 1_700_000_000_000,
                reply_to: None,
                attachments: Vec::new(),
                mentions: Vec::new(),
            },
        }
    }

    pub fn from(mut self, actor: &str) -> Self {
        let mut name = actor.to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        self.message.sender = Sender {
            id: ActorId::new(actor),
            number: Some(number_for(actor)),
            display_name: Some(name),
        };
        if let ConversationId::Direct(_) = self.message.conversation {
            self.message.conversation = ConversationId::Direct(ActorId::new(actor));
        }
        self
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.message.conversation = ConversationId::Group(group.to_string());
        self
    }

    pub fn direct(mut self) -> Self {
        self.message.conversation = ConversationId::Direct(self.message.sender.id.clone());
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.message.timestamp = timestamp;
        self
    }

    /// Quotes a message the bot sent at `timestamp`.
    pub fn quoting_bot(mut self, timestamp: i64, text: &str) -> Self {
        self.message.reply_to = Some(QuoteRef {
            timestamp,
            author: Some(ActorId::new(BOT_UUID)),
            author_number: Some(BOT_NUMBER.to_string()),
            text: Some(text.to_string()),
            attachments: Vec::new(),
        });
        self
    }

    /// Quotes a message written by `actor`.
    pub fn quoting(mut self, actor: &str, timestamp: i64, text: &str) -> Self {
        self.message.reply_to = Some(QuoteRef {
            timestamp,
            author: Some(ActorId::new(actor)),
            author_number: Some(number_for(actor)),
            text: Some(text.to_string()),
            attachments: Vec::new(),
        });
        self
    }

    /// Prepends a mention placeholder for `actor`.
    pub fn mentioning(mut self, actor: &str) -> Self {
        self.message.text = format!("{MENTION_PLACEHOLDER} {}", self.message.text);
        for m in &mut self.message.mentions {
            m.start += 2;
        }
        self.message.mentions.insert(
            0,
            Mention {
                actor: ActorId::new(actor),
                number: Some(number_for(actor)),
                name: None,
                start: 0,
                length: 1,
            },
        );
        self
    }

    pub fn mentioning_bot(mut self) -> Self {
        self.message.text = format!("{MENTION_PLACEHOLDER} {}", self.message.text);
        self.message.mentions.insert(
            0,
            Mention {
                actor: ActorId::new(BOT_UUID),
                number: Some(BOT_NUMBER.to_string()),
                name: Some("sigil".into()),
                start: 0,
                length: 1,
            },
        );
        self
    }

    pub fn with_attachment(mut self, content_type: &str) -> Self {
        self.message.attachments.push(Attachment {
            id: Some(format!("att{}", self.message.attachments.len() + 1)),
            content_type: Some(content_type.to_string()),
            filename: None,
            size: Some(1024),
        });
        self
    }

    pub fn build(self) -> Message {
        self.message
    }
}

/// Shorthand for `MessageBuilder::new(text)`.
pub fn msg(text: &str) -> MessageBuilder {
    MessageBuilder::new(text)
}

/// A reaction by `actor` to a bot message sent at `target_timestamp`.
pub fn reaction_to_bot(actor: &str, emoji: &str, target_timestamp: i64) -> Reaction {
    Reaction {
        emoji: emoji.to_string(),
        target_timestamp,
        target_author: Some(ActorId::new(BOT_UUID)),
        target_author_number: Some(BOT_NUMBER.to_string()),
        conversation: ConversationId::Group(GROUP_ID.into()),
        actor: ActorId::new(actor),
        actor_number: Some(number_for(actor)),
        is_remove: false,
        timestamp: target_timestamp + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_bot_quotes_and_mentions() {
        let bot = bot_identity();
        let message = msg("tell me more").from("bob").quoting_bot(5, "answer").build();
        assert!(message.quotes_identity(&bot));
        assert_eq!(message.sender.display_name.as_deref(), Some("Bob"));

        let message = msg("hello").mentioning_bot().build();
        assert!(message.mentions_identity(&bot));
        assert_eq!(message.plain_text(), "hello");
    }

    #[test]
    fn numbers_are_stable_per_actor() {
        assert_eq!(number_for("carol"), number_for("carol"));
        assert_ne!(number_for("carol"), number_for("dave"));
    }
}
