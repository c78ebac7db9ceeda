// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parses trigger-prefixed messages and runs the matching command.
//!
//! Each invocation is isolated: a handler error or panic becomes a failure
//! reply and a usage record, and the next message is dispatched normally.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use sigil_core::types::UsageEvent;
use sigil_core::{Message, Messenger, SigilError, UsageRecorder};
use tracing::{debug, error, warn};

use crate::command::CommandContext;
use crate::registry::CommandTable;

/// What happened to an inbound message offered to the dispatcher.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The text does not start with the trigger followed by a verb.
    NotACommand,
    /// The verb is not registered. A hint was sent back.
    NotFound { verb: String },
    Completed { verb: String, duration: Duration },
    Failed { verb: String, error: String },
}

impl DispatchOutcome {
    /// Whether the message was consumed as a command invocation.
    pub fn handled(&self) -> bool {
        !matches!(self, DispatchOutcome::NotACommand)
    }
}

/// Splits `"!Verb some args"` into `("verb", "some args")`.
///
/// The trigger must be the first non-blank character and be followed
/// directly by the verb.
pub fn parse_invocation(text: &str, trigger: char) -> Option<(String, String)> {
    let body = text.trim_start().strip_prefix(trigger)?;
    let verb_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let verb = &body[..verb_end];
    if verb.is_empty() || !verb.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some((verb.to_lowercase(), body[verb_end..].trim().to_string()))
}

pub struct Dispatcher {
    table: CommandTable,
    messenger: Arc<dyn Messenger>,
    usage: Arc<dyn UsageRecorder>,
    trigger: char,
}

impl Dispatcher {
    pub fn new(
        table: CommandTable,
        messenger: Arc<dyn Messenger>,
        usage: Arc<dyn UsageRecorder>,
        trigger: char,
    ) -> Self {
        Self {
            table,
            messenger,
            usage,
            trigger,
        }
    }

    pub fn trigger(&self) -> char {
        self.trigger
    }

    /// Whether `message` looks like a command invocation.
    pub fn is_invocation(&self, message: &Message) -> bool {
        parse_invocation(&message.text, self.trigger).is_some()
    }

    pub async fn dispatch(&self, message: &Message) -> DispatchOutcome {
        let Some((verb, raw_args)) = parse_invocation(&message.text, self.trigger) else {
            return DispatchOutcome::NotACommand;
        };

        let registry = self.table.snapshot();
        let Some(descriptor) = registry.get(&verb) else {
            debug!(verb = %verb, "unknown command");
            self.record(&verb, message, false, Duration::ZERO, Some("unknown command".into()));
            self.reply(
                message,
                &format!(
                    "Unknown command: {t}{verb}. Send {t}help for the list.",
                    t = self.trigger
                ),
            )
            .await;
            return DispatchOutcome::NotFound { verb };
        };

        let ctx = CommandContext::new(verb.clone(), &raw_args, message);
        let handler = Arc::clone(&descriptor.handler);
        let started = Instant::now();
        let result = AssertUnwindSafe(handler.execute(ctx)).catch_unwind().await;
        let duration = started.elapsed();

        let result = match result {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(verb = %verb, panic = %detail, "command handler panicked");
                Err(SigilError::handler(&verb, "internal error"))
            }
        };

        match result {
            Ok(reply) => {
                self.record(&verb, message, true, duration, None);
                if let Some(text) = reply.filter(|t| !t.trim().is_empty()) {
                    self.reply(message, &text).await;
                }
                DispatchOutcome::Completed { verb, duration }
            }
            Err(e) => {
                let user_text = e.user_message();
                self.record(&verb, message, false, duration, Some(e.to_string()));
                self.reply(
                    message,
                    &format!("⚠️ {}{verb} failed: {user_text}", self.trigger),
                )
                .await;
                DispatchOutcome::Failed {
                    verb,
                    error: user_text,
                }
            }
        }
    }

    fn record(
        &self,
        verb: &str,
        message: &Message,
        success: bool,
        duration: Duration,
        error: Option<String>,
    ) {
        self.usage.record(UsageEvent {
            command: verb.to_string(),
            actor: message.sender.id.clone(),
            conversation: message.conversation.key(),
            success,
            duration,
            error,
            at: Utc::now(),
        });
    }

    async fn reply(&self, message: &Message, text: &str) {
        if let Err(e) = self.messenger.send_reply(message, text).await {
            warn!(error = %e, conversation = %message.conversation, "failed to send command reply");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
