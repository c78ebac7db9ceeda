// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use sigil_commands::{Command, CommandContext};
use sigil_core::{ProviderTag, SigilError};

use super::responder::AiResponder;

/// `!ai`, `!gpt` and `!claude`: ask a provider and open a thread.
pub struct AiCommand {
    verb: &'static str,
    description: &'static str,
    tag: ProviderTag,
    responder: Arc<AiResponder>,
}

impl AiCommand {
    pub fn new(
        verb: &'static str,
        description: &'static str,
        tag: ProviderTag,
        responder: Arc<AiResponder>,
    ) -> Self {
        Self {
            verb,
            description,
            tag,
            responder,
        }
    }
}

#[async_trait]
impl Command for AiCommand {
    fn verb(&self) -> &str {
        self.verb
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError> {
        let mut prompt = ctx.rest();
        if prompt.is_empty() {
            match &ctx.quoted_text {
                Some(quoted) if !quoted.trim().is_empty() => prompt = quoted.trim().to_string(),
                _ => {
                    let trigger = ctx.message.text.trim_start().chars().next().unwrap_or('!');
                    return Ok(Some(format!("Usage: {trigger}{} <question>", self.verb)));
                }
            }
        }
        let answer = self.responder.ask(&ctx.message, self.tag, &prompt).await?;
        Ok(Some(answer))
    }
}

/// AI commands for every configured provider.
///
/// `ai` and `gpt` need the OpenAI provider, `claude` the Claude one.
pub fn ai_commands(responder: &Arc<AiResponder>) -> Vec<Arc<dyn Command>> {
    let mut commands: Vec<Arc<dyn Command>> = Vec::new();
    if responder.has_provider(ProviderTag::OpenAi) {
        commands.push(Arc::new(AiCommand::new(
            "ai",
            "Ask the AI assistant",
            ProviderTag::OpenAi,
            Arc::clone(responder),
        )));
        commands.push(Arc::new(AiCommand::new(
            "gpt",
            "Ask OpenAI",
            ProviderTag::OpenAi,
            Arc::clone(responder),
        )));
    }
    if responder.has_provider(ProviderTag::Claude) {
        commands.push(Arc::new(AiCommand::new(
            "claude",
            "Ask Claude",
            ProviderTag::Claude,
            Arc::clone(responder),
        )));
    }
    commands
}
