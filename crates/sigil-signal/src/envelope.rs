// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts raw daemon envelopes into [`Inbound`] messages and reactions.
//!
//! Normalization is pure. Records the bot cannot act on (sync copies,
//! receipts, typing notices, group updates without text, messages written
//! by the bot itself) normalize to `None`.

use serde_json::Value;
use sigil_core::types::{Attachment, Mention, QuoteRef, Sender};
use sigil_core::{ActorId, BotIdentity, ConversationId, Inbound, Message, Reaction};

/// Normalize the `params` of a `receive` push event.
///
/// The envelope is read from `params.envelope`, falling back to
/// `params.result.envelope`.
pub fn normalize(params: &Value, bot: &BotIdentity) -> Option<Inbound> {
    let envelope = params
        .get("envelope")
        .or_else(|| params.get("result").and_then(|r| r.get("envelope")))?;

    let sender = sender_of(envelope)?;
    if bot.is_self(sender.id.as_str()) || sender.number.as_deref().is_some_and(|n| bot.is_self(n))
    {
        return None;
    }

    let data = envelope.get("dataMessage").filter(|d| d.is_object())?;
    let timestamp = data
        .get("timestamp")
        .or_else(|| envelope.get("timestamp"))
        .and_then(Value::as_i64)
        .unwrap_or_default();

    let conversation = match data
        .get("groupInfo")
        .and_then(|g| g.get("groupId"))
        .and_then(Value::as_str)
    {
        Some(group) => ConversationId::Group(group.to_string()),
        None => ConversationId::Direct(sender.id.clone()),
    };

    if let Some(reaction) = data.get("reaction").filter(|r| r.is_object()) {
        return reaction_of(reaction, &sender, conversation, timestamp).map(Inbound::Reaction);
    }

    let text = str_field(data, "message").unwrap_or_default();
    let attachments = attachments_of(data.get("attachments"));
    if text.trim().is_empty() && attachments.is_empty() {
        return None;
    }

    Some(Inbound::Message(Message {
        sender,
        conversation,
        text,
        timestamp,
        reply_to: data.get("quote").and_then(quote_of),
        attachments,
        mentions: mentions_of(data.get("mentions")),
    }))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn sender_of(envelope: &Value) -> Option<Sender> {
    let uuid = str_field(envelope, "sourceUuid");
    let number = str_field(envelope, "sourceNumber").or_else(|| {
        str_field(envelope, "source").filter(|s| s.starts_with('+'))
    });
    let id = uuid
        .clone()
        .or_else(|| number.clone())
        .or_else(|| str_field(envelope, "source"))?;
    Some(Sender {
        id: ActorId::new(id),
        number,
        display_name: str_field(envelope, "sourceName"),
    })
}

fn reaction_of(
    reaction: &Value,
    sender: &Sender,
    conversation: ConversationId,
    timestamp: i64,
) -> Option<Reaction> {
    let emoji = str_field(reaction, "emoji")?;
    let target_timestamp = reaction.get("targetSentTimestamp").and_then(Value::as_i64)?;
    let target_author_number = str_field(reaction, "targetAuthorNumber");
    let target_author = str_field(reaction, "targetAuthorUuid")
        .or_else(|| str_field(reaction, "targetAuthor"))
        .map(ActorId::new);
    Some(Reaction {
        emoji,
        target_timestamp,
        target_author,
        target_author_number,
        conversation,
        actor: sender.id.clone(),
        actor_number: sender.number.clone(),
        is_remove: reaction
            .get("isRemove")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        timestamp,
    })
}

fn quote_of(quote: &Value) -> Option<QuoteRef> {
    let timestamp = quote.get("id").and_then(Value::as_i64)?;
    let author_number = str_field(quote, "authorNumber")
        .or_else(|| str_field(quote, "author").filter(|a| a.starts_with('+')));
    let author = str_field(quote, "authorUuid")
        .or_else(|| str_field(quote, "author"))
        .map(ActorId::new);
    Some(QuoteRef {
        timestamp,
        author,
        author_number,
        text: str_field(quote, "text"),
        attachments: attachments_of(quote.get("attachments")),
    })
}

fn attachments_of(value: Option<&Value>) -> Vec<Attachment> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|a| a.is_object())
                .map(|a| Attachment {
                    id: str_field(a, "id"),
                    content_type: str_field(a, "contentType"),
                    filename: str_field(a, "filename"),
                    size: a.get("size").and_then(Value::as_u64),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn mentions_of(value: Option<&Value>) -> Vec<Mention> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|m| {
                    let number = str_field(m, "number");
                    let actor = str_field(m, "uuid").or_else(|| number.clone())?;
                    Some(Mention {
                        actor: ActorId::new(actor),
                        number,
                        name: str_field(m, "name"),
                        start: m.get("start").and_then(Value::as_u64).unwrap_or(0) as u32,
                        length: m.get("length").and_then(Value::as_u64).unwrap_or(1) as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
