// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher behaviour against mock collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use sigil_commands::{
    AdminPolicy, Command, CommandContext, CommandTable, DispatchOutcome, Dispatcher,
    HelpCommand, PingCommand, RegistryBuilder, StatsCommand, UsageLog,
};
use sigil_core::types::GroupInfo;
use sigil_core::SigilError;
use sigil_test_utils::fixtures::{number_for, GROUP_ID};
use sigil_test_utils::{msg, MockMessenger, RecordingUsage};

struct Failing;

#[async_trait]
impl Command for Failing {
    fn verb(&self) -> &str {
        "x"
    }

    fn description(&self) -> &str {
        "always fails"
    }

    async fn execute(&self, _ctx: CommandContext) -> Result<Option<String>, SigilError> {
        Err(SigilError::handler("x", "kaboom"))
    }
}

struct Panicking;

#[async_trait]
impl Command for Panicking {
    fn verb(&self) -> &str {
        "boom"
    }

    fn description(&self) -> &str {
        "panics"
    }

    async fn execute(&self, _ctx: CommandContext) -> Result<Option<String>, SigilError> {
        panic!("handler exploded");
    }
}

struct Echo;

#[async_trait]
impl Command for Echo {
    fn verb(&self) -> &str {
        "y"
    }

    fn description(&self) -> &str {
        "echoes its arguments"
    }

    async fn execute(&self, ctx: CommandContext) -> Result<Option<String>, SigilError> {
        Ok(Some(format!("y:{}", ctx.rest())))
    }
}

struct Harness {
    messenger: Arc<MockMessenger>,
    usage: Arc<UsageLog>,
    dispatcher: Dispatcher,
}

fn harness(admins: Vec<String>) -> Harness {
    let messenger = Arc::new(MockMessenger::new());
    let usage = Arc::new(UsageLog::new(50));
    let policy = Arc::new(AdminPolicy::new(admins, messenger.clone()));
    let table = CommandTable::default();

    let builtins: Vec<Arc<dyn Command>> = vec![
        Arc::new(HelpCommand::new(table.clone(), policy.clone(), '!', "sigil")),
        Arc::new(PingCommand),
        Arc::new(StatsCommand::new(usage.clone(), policy)),
    ];
    let extensions: Vec<Arc<dyn Command>> =
        vec![Arc::new(Failing), Arc::new(Echo), Arc::new(Panicking)];
    table.replace(RegistryBuilder::new().extend(builtins).extend(extensions).build());

    let dispatcher = Dispatcher::new(table, messenger.clone(), usage.clone(), '!');
    Harness {
        messenger,
        usage,
        dispatcher,
    }
}

#[tokio::test]
async fn plain_text_is_not_a_command() {
    let h = harness(vec![]);
    let outcome = h.dispatcher.dispatch(&msg("hello there").build()).await;
    assert!(matches!(outcome, DispatchOutcome::NotACommand));
    assert_eq!(h.messenger.sent_count().await, 0);
    assert!(h.usage.recent().is_empty());
}

#[tokio::test]
async fn unknown_verb_replies_with_hint_and_records_failure() {
    let h = harness(vec![]);
    let outcome = h.dispatcher.dispatch(&msg("!frobnicate now").build()).await;
    match outcome {
        DispatchOutcome::NotFound { verb } => assert_eq!(verb, "frobnicate"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        h.messenger.last_text().await.as_deref(),
        Some("Unknown command: !frobnicate. Send !help for the list.")
    );
    let failures = h.usage.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].command, "frobnicate");
}

#[tokio::test]
async fn failing_handler_does_not_affect_next_dispatch() {
    let h = harness(vec![]);

    let first = h.dispatcher.dispatch(&msg("!x").build()).await;
    assert!(matches!(first, DispatchOutcome::Failed { .. }));
    assert_eq!(
        h.messenger.last_text().await.as_deref(),
        Some("⚠️ !x failed: kaboom")
    );

    let second = h.dispatcher.dispatch(&msg("!y a b").build()).await;
    assert!(matches!(second, DispatchOutcome::Completed { .. }));
    assert_eq!(h.messenger.last_text().await.as_deref(), Some("y:a b"));

    assert_eq!(h.usage.stats_for("x").failed, 1);
    assert_eq!(h.usage.stats_for("y").succeeded, 1);
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let h = harness(vec![]);
    let outcome = h.dispatcher.dispatch(&msg("!boom").build()).await;
    match outcome {
        DispatchOutcome::Failed { verb, error } => {
            assert_eq!(verb, "boom");
            assert_eq!(error, "internal error");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let ping = h.dispatcher.dispatch(&msg("!PING").build()).await;
    assert!(matches!(ping, DispatchOutcome::Completed { .. }));
    assert_eq!(h.messenger.last_text().await.as_deref(), Some("pong"));
}

#[tokio::test]
async fn reply_send_failure_is_not_a_command_failure() {
    let h = harness(vec![]);
    h.messenger.fail_sends(true);
    let outcome = h.dispatcher.dispatch(&msg("!ping").build()).await;
    assert!(matches!(outcome, DispatchOutcome::Completed { .. }));
    assert_eq!(h.usage.stats_for("ping").succeeded, 1);
}

#[tokio::test]
async fn help_hides_admin_commands_from_members() {
    let h = harness(vec![]);
    h.dispatcher.dispatch(&msg("!help").build()).await;
    let text = h.messenger.last_text().await.unwrap_or_default();
    assert!(text.contains("!ping - Check that the bot is alive"));
    assert!(text.contains("!y - echoes its arguments"));
    assert!(!text.contains("!stats"));
}

#[tokio::test]
async fn help_shows_admin_commands_to_group_admins() {
    let h = harness(vec![]);
    h.messenger
        .set_groups(vec![GroupInfo {
            id: GROUP_ID.into(),
            name: Some("Test".into()),
            members: vec![number_for("alice")],
            admins: vec![number_for("alice")],
        }])
        .await;
    h.dispatcher.dispatch(&msg("!help").build()).await;
    let text = h.messenger.last_text().await.unwrap_or_default();
    assert!(text.contains("!stats - Show command usage statistics (admin)"));
}

#[tokio::test]
async fn stats_requires_admin() {
    let h = harness(vec![number_for("root")]);
    h.dispatcher.dispatch(&msg("!ping").build()).await;

    let denied = h.dispatcher.dispatch(&msg("!stats").from("mallory").build()).await;
    assert!(matches!(denied, DispatchOutcome::Failed { .. }));
    assert_eq!(
        h.messenger.last_text().await.as_deref(),
        Some("⚠️ !stats failed: not authorized: !stats is limited to admins")
    );

    let allowed = h.dispatcher.dispatch(&msg("!stats").from("root").build()).await;
    assert!(matches!(allowed, DispatchOutcome::Completed { .. }));
    let text = h.messenger.last_text().await.unwrap_or_default();
    assert!(text.starts_with("Command usage:"));
    assert!(text.contains("ping: 1 ok, 0 failed"));
    assert!(text.contains("Recent failures:"));
}

#[tokio::test]
async fn usage_can_go_to_any_recorder() {
    let messenger = Arc::new(MockMessenger::new());
    let usage = Arc::new(RecordingUsage::new());
    let table = CommandTable::new(RegistryBuilder::new().register(Arc::new(PingCommand)).build());
    let dispatcher = Dispatcher::new(table, messenger, usage.clone(), '!');

    dispatcher.dispatch(&msg("!ping").direct().build()).await;
    let events = usage.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert!(events[0].conversation.starts_with("direct:"));
}
