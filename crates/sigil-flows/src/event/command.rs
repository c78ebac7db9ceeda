// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use sigil_commands::{Command, CommandContext};
use sigil_core::SigilError;

use super::flow::EventFlow;

/// `!eventadd <description>`: starts an event draft for the sender.
pub struct EventAddCommand {
    flow: Arc<EventFlow>,
}

impl EventAddCommand {
    pub fn new(flow: Arc<EventFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl Command for EventAddCommand {
    fn verb(&self) -> &str {
        "eventadd"
    }

    fn description(&self) -> &str {
        "Create an event from a description"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError> {
        let description = ctx.rest();
        if description.is_empty() {
            let t = ctx.message.text.trim_start().chars().next().unwrap_or('!');
            return Ok(Some(format!(
                "Usage: {t}eventadd <description>\nFor example: {t}eventadd Meetup next Tuesday 7pm at 100 Main St, Springfield"
            )));
        }
        let prompt = self.flow.start(&ctx.message, &description).await?;
        Ok(Some(prompt))
    }
}
