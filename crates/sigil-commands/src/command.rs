// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command contract and the per-invocation context.
//!
//! Admin-only commands are not gated by the dispatcher. Each such command
//! consults an [`AdminPolicy`](crate::AdminPolicy) itself, because whether
//! someone is an admin can depend on the conversation they are in.

use std::sync::Arc;

use async_trait::async_trait;
use sigil_core::types::{Attachment, Mention, MENTION_PLACEHOLDER};
use sigil_core::{ActorId, ConversationId, Message, SigilError};

/// A chat command invoked as `<trigger><verb> [args...]`.
#[async_trait]
pub trait Command: Send + Sync {
    /// Canonical lower-case verb.
    fn verb(&self) -> &str;

    /// One-line description shown by `help`.
    fn description(&self) -> &str;

    /// Whether `help` lists this command only to admins.
    fn admin_only(&self) -> bool {
        false
    }

    /// Runs the command. `Ok(Some(text))` is sent back as a reply.
    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError>;
}

/// Registry entry for a command.
#[derive(Clone)]
pub struct CommandDescriptor {
    pub verb: String,
    pub description: String,
    pub admin_only: bool,
    pub handler: Arc<dyn Command>,
}

impl CommandDescriptor {
    pub fn from_command(handler: Arc<dyn Command>) -> Self {
        Self {
            verb: handler.verb().to_lowercase(),
            description: handler.description().to_string(),
            admin_only: handler.admin_only(),
            handler,
        }
    }
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("verb", &self.verb)
            .field("admin_only", &self.admin_only)
            .finish()
    }
}

/// Everything a command gets to see about its invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub verb: String,
    pub actor_id: ActorId,
    pub actor_number: Option<String>,
    pub display_name: String,
    pub conversation: ConversationId,
    pub is_group: bool,
    /// Whitespace-separated arguments, mention placeholders removed.
    pub args: Vec<String>,
    /// Text after the verb with its original spacing.
    pub raw_args: String,
    pub quoted_text: Option<String>,
    pub quoted_attachments: Vec<Attachment>,
    pub attachments: Vec<Attachment>,
    pub mentions: Vec<Mention>,
    pub timestamp: i64,
    /// The message that carried the invocation.
    pub message: Message,
}

impl CommandContext {
    pub fn new(verb: impl Into<String>, raw_args: &str, message: &Message) -> Self {
        let quote = message.reply_to.as_ref();
        let raw_args = raw_args.trim();
        Self {
            verb: verb.into(),
            actor_id: message.sender.id.clone(),
            actor_number: message.sender.number.clone(),
            display_name: message.sender.label().to_string(),
            conversation: message.conversation.clone(),
            is_group: message.is_group(),
            args: raw_args
                .split_whitespace()
                .filter(|a| !a.chars().all(|c| c == MENTION_PLACEHOLDER))
                .map(str::to_string)
                .collect(),
            raw_args: raw_args.to_string(),
            quoted_text: quote.and_then(|q| q.text.clone()),
            quoted_attachments: quote.map(|q| q.attachments.clone()).unwrap_or_default(),
            attachments: message.attachments.clone(),
            mentions: message.mentions.clone(),
            timestamp: message.timestamp,
            message: message.clone(),
        }
    }

    /// Argument text with mention placeholders removed.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }
}
