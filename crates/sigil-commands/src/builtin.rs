// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in commands: `help`, `ping` and `stats`.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use sigil_core::SigilError;

use crate::auth::AdminPolicy;
use crate::command::{Command, CommandContext};
use crate::registry::CommandTable;
use crate::usage::UsageLog;

/// Lists the verbs in the live table.
pub struct HelpCommand {
    table: CommandTable,
    policy: Arc<AdminPolicy>,
    trigger: char,
    bot_name: String,
}

impl HelpCommand {
    pub fn new(
        table: CommandTable,
        policy: Arc<AdminPolicy>,
        trigger: char,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            table,
            policy,
            trigger,
            bot_name: bot_name.into(),
        }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn verb(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List available commands"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError> {
        let registry = self.table.snapshot();
        let entries = registry.list();
        let show_admin = if entries.iter().any(|d| d.admin_only) {
            self.policy.check(&ctx).await
        } else {
            false
        };

        let mut out = format!("{} commands:", self.bot_name);
        for descriptor in entries.into_iter().filter(|d| show_admin || !d.admin_only) {
            let _ = write!(
                out,
                "\n{}{} - {}",
                self.trigger, descriptor.verb, descriptor.description
            );
            if descriptor.admin_only {
                out.push_str(" (admin)");
            }
        }
        Ok(Some(out))
    }
}

pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    fn verb(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check that the bot is alive"
    }

    async fn execute(&self, _ctx: CommandContext) -> Result<Option<String>, SigilError> {
        Ok(Some("pong".to_string()))
    }
}

/// Reports usage counters and recent failures. Admins only.
pub struct StatsCommand {
    usage: Arc<UsageLog>,
    policy: Arc<AdminPolicy>,
}

impl StatsCommand {
    const RECENT_FAILURES: usize = 5;

    pub fn new(usage: Arc<UsageLog>, policy: Arc<AdminPolicy>) -> Self {
        Self { usage, policy }
    }
}

#[async_trait]
impl Command for StatsCommand {
    fn verb(&self) -> &str {
        "stats"
    }

    fn description(&self) -> &str {
        "Show command usage statistics"
    }

    fn admin_only(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError> {
        self.policy.require(&ctx).await?;

        let rows = self.usage.leaderboard();
        if rows.is_empty() {
            return Ok(Some("No commands recorded yet.".to_string()));
        }

        let mut out = String::from("Command usage:");
        for (verb, stats) in &rows {
            let _ = write!(
                out,
                "\n{verb}: {} ok, {} failed, avg {}ms",
                stats.succeeded,
                stats.failed,
                stats.mean_duration().as_millis()
            );
        }

        let failures = self.usage.failures();
        if !failures.is_empty() {
            out.push_str("\nRecent failures:");
            for event in failures.iter().rev().take(Self::RECENT_FAILURES) {
                let _ = write!(
                    out,
                    "\n{} {} by {}: {}",
                    event.at.format("%Y-%m-%d %H:%M"),
                    event.command,
                    event.actor,
                    event.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Ok(Some(out))
    }
}
