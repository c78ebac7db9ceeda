// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use sigil_commands::{AdminPolicy, Command, CommandContext};
use sigil_core::{ActorId, SigilError};
use tracing::debug;

use super::flow::{OnboardingFlow, SubjectRef};
use super::intro::normalize_number;

/// `!onboard <@mention|number> [name]`, `!onboard cancel <...>`, `!onboard status`.
pub struct OnboardCommand {
    flow: Arc<OnboardingFlow>,
    policy: Arc<AdminPolicy>,
}

impl OnboardCommand {
    pub fn new(flow: Arc<OnboardingFlow>, policy: Arc<AdminPolicy>) -> Self {
        Self { flow, policy }
    }

    fn is_phone(arg: &str) -> bool {
        arg.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.'))
            && normalize_number(arg).is_some()
    }

    /// Subject from the first non-bot mention, or a phone number argument.
    fn subject(&self, ctx: &CommandContext, args: &[String]) -> Option<SubjectRef> {
        let bot = self.flow.bot();
        let mention = ctx.mentions.iter().find(|m| {
            !bot.is_self(m.actor.as_str()) && !m.number.as_deref().is_some_and(|n| bot.is_self(n))
        });
        let phone = args.iter().position(|a| Self::is_phone(a));
        let written: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != phone)
            .map(|(_, a)| a.as_str())
            .collect();
        let written = (!written.is_empty()).then(|| written.join(" "));

        let (id, number, mention_name) = match (mention, phone) {
            (Some(m), _) => (m.actor.clone(), m.number.clone(), m.name.clone()),
            (None, Some(i)) => {
                let number = normalize_number(&args[i])?;
                (ActorId::new(number.clone()), Some(number), None)
            }
            (None, None) => return None,
        };
        let name = written
            .or(mention_name)
            .unwrap_or_else(|| number.clone().unwrap_or_else(|| id.to_string()));
        Some(SubjectRef { id, number, name })
    }

    fn status(&self) -> String {
        let rows = self.flow.status();
        if rows.is_empty() {
            return "Nobody is being onboarded.".to_string();
        }
        let mut out = String::from("Onboarding:");
        for row in rows {
            let minutes = row.waiting.as_secs() / 60;
            out.push_str(&format!(
                "\n{} - {} for {}h {}m",
                row.subject.name,
                row.stage,
                minutes / 60,
                minutes % 60
            ));
        }
        out
    }
}

#[async_trait]
impl Command for OnboardCommand {
    fn verb(&self) -> &str {
        "onboard"
    }

    fn description(&self) -> &str {
        "Screen a newcomer in the entry group"
    }

    fn admin_only(&self) -> bool {
        self.flow.settings().require_admin
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError> {
        if self.admin_only() {
            self.policy.require(&ctx).await?;
        }

        let t = ctx.message.text.trim_start().chars().next().unwrap_or('!');
        if ctx.message.conversation != self.flow.settings().entry() {
            debug!(conversation = %ctx.message.conversation, "onboard outside the entry group");
            return Ok(Some(format!("{t}onboard only works in the entry group.")));
        }
        let usage = format!(
            "Usage: {t}onboard <@mention|number> [name], {t}onboard cancel <@mention|number>, {t}onboard status"
        );
        let sub = ctx.args.first().map(|a| a.to_lowercase());
        match sub.as_deref() {
            Some("status") => Ok(Some(self.status())),
            Some("cancel") => {
                let Some(subject) = self.subject(&ctx, &ctx.args[1..]) else {
                    return Ok(Some(usage));
                };
                if self.flow.cancel(&subject) {
                    Ok(Some(format!("Onboarding cancelled for {}.", subject.name)))
                } else {
                    Ok(Some(format!("{} is not being onboarded.", subject.name)))
                }
            }
            _ => match self.subject(&ctx, &ctx.args) {
                Some(subject) => self.flow.begin(subject).await.map(Some),
                None => Ok(Some(usage)),
            },
        }
    }
}
