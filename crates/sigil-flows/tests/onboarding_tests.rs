// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Onboarding: introductions, vouching and timeouts on paused time.

use std::sync::Arc;
use std::time::Duration;

use sigil_commands::{AdminPolicy, Command, CommandContext};
use sigil_core::types::GroupInfo;
use sigil_core::{ActorId, ConversationId, Message};
use sigil_flows::onboarding::{
    OnboardCommand, OnboardingFlow, OnboardingSettings, OnboardingStage, SubjectRef,
};
use sigil_test_utils::fixtures::number_for;
use sigil_test_utils::{bot_identity, msg, reaction_to_bot, MockMessenger, RecordingIssuer};

const ENTRY: &str = "entry-group";
const TIMEOUT: Duration = Duration::from_secs(72 * 3600);
/// Timestamp of the first message the mock messenger sends.
const FIRST_SENT: i64 = 1_800_000_000_000;

struct Harness {
    messenger: Arc<MockMessenger>,
    issuer: Arc<RecordingIssuer>,
    policy: Arc<AdminPolicy>,
    flow: Arc<OnboardingFlow>,
}

fn harness() -> Harness {
    let messenger = Arc::new(MockMessenger::new());
    let issuer = Arc::new(RecordingIssuer::new());
    let policy = Arc::new(AdminPolicy::new(
        vec!["admin".to_string()],
        messenger.clone(),
    ));
    let flow = OnboardingFlow::new(
        OnboardingSettings {
            entry_group_id: ENTRY.into(),
            timeout: TIMEOUT,
            require_admin: true,
        },
        messenger.clone(),
        issuer.clone(),
        policy.clone(),
        bot_identity(),
    );
    Harness {
        messenger,
        issuer,
        policy,
        flow,
    }
}

fn dana() -> SubjectRef {
    SubjectRef {
        id: ActorId::new("dana"),
        number: Some(number_for("dana")),
        name: "Dana".into(),
    }
}

/// Dana's introduction naming Fox, quoting the prompt.
fn introduction() -> Message {
    msg("name: Dana Scully\nfound us: a friend")
        .mentioning("fox")
        .from("dana")
        .in_group(ENTRY)
        .quoting_bot(FIRST_SENT, "Welcome Dana!")
        .build()
}

fn fox_says(text: &str, quoted: i64) -> Message {
    msg(text)
        .from("fox")
        .in_group(ENTRY)
        .quoting_bot(quoted, "Do you vouch for them?")
        .build()
}

#[tokio::test(start_paused = true)]
async fn silent_subject_is_removed_after_the_timeout() {
    let h = harness();
    h.flow.begin(dana()).await.unwrap();
    assert_eq!(h.messenger.sent_count().await, 1);
    assert!(h
        .messenger
        .last_text()
        .await
        .unwrap()
        .contains("You have 72 hours"));

    tokio::time::sleep(TIMEOUT - Duration::from_secs(60)).await;
    assert!(h.flow.is_pending(&ActorId::new("dana")));

    tokio::time::sleep(Duration::from_secs(120)).await;
    h.messenger.wait_for_sent(2).await;

    let updates = h.messenger.group_updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, ENTRY);
    assert_eq!(updates[0].1.remove_members, vec![number_for("dana")]);
    assert!(h
        .messenger
        .last_text()
        .await
        .unwrap()
        .contains("did not complete onboarding in time"));
    assert!(h.flow.is_empty());
}

#[tokio::test(start_paused = true)]
async fn vouch_yes_approves_and_clears_state() {
    let h = harness();
    h.flow.begin(dana()).await.unwrap();

    assert!(h.flow.handle_message(&introduction()).await.unwrap());
    let stage = h.flow.stage_of(&ActorId::new("dana")).unwrap();
    assert!(matches!(stage, OnboardingStage::AwaitingVouch { ref inviter } if inviter.id == ActorId::new("fox")));
    let request = h.messenger.last_text().await.unwrap();
    assert!(request.contains("Dana Scully says you invited them"), "{request}");

    // A "yes" not aimed at the vouch request is ignored.
    let stray = msg("yes").from("fox").in_group(ENTRY).build();
    assert!(!h.flow.handle_message(&stray).await.unwrap());

    assert!(h
        .flow
        .handle_message(&fox_says("yes", FIRST_SENT + 1))
        .await
        .unwrap());
    assert!(h.flow.is_empty());

    let issued = h.issuer.issued().await;
    assert_eq!(issued, vec![(ActorId::new("dana"), "Dana Scully".to_string())]);

    let sent = h.messenger.sent_messages().await;
    let welcome = sent
        .iter()
        .find(|m| m.conversation == ConversationId::Direct(ActorId::new(number_for("dana"))))
        .expect("welcome sent by direct message");
    assert!(welcome.text.contains("credential-for-dana"));

    // Fox is not an admin, so both leave the entry group.
    let updates = h.messenger.group_updates().await;
    assert_eq!(
        updates[0].1.remove_members,
        vec![number_for("dana"), number_for("fox")]
    );

    // The timer armed for the vouch stage is gone with the state.
    tokio::time::sleep(TIMEOUT * 2).await;
    assert_eq!(h.messenger.group_updates().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn admin_inviter_stays_in_the_entry_group() {
    let h = harness();
    h.messenger
        .set_groups(vec![GroupInfo {
            id: ENTRY.into(),
            name: Some("Entry".into()),
            members: vec![],
            admins: vec![number_for("fox")],
        }])
        .await;
    h.flow.begin(dana()).await.unwrap();
    h.flow.handle_message(&introduction()).await.unwrap();

    let reaction = reaction_to_bot("fox", "👍", FIRST_SENT + 1);
    assert!(h.flow.handle_reaction(&reaction).await.unwrap());

    let updates = h.messenger.group_updates().await;
    assert_eq!(updates[0].1.remove_members, vec![number_for("dana")]);
    assert!(h.flow.is_empty());
}

#[tokio::test(start_paused = true)]
async fn vouch_no_removes_the_subject() {
    let h = harness();
    h.flow.begin(dana()).await.unwrap();
    h.flow.handle_message(&introduction()).await.unwrap();

    assert!(h
        .flow
        .handle_message(&fox_says("no", FIRST_SENT + 1))
        .await
        .unwrap());
    assert!(h.flow.is_empty());
    assert!(h.issuer.issued().await.is_empty());
    let updates = h.messenger.group_updates().await;
    assert_eq!(updates[0].1.remove_members, vec![number_for("dana")]);
}

#[tokio::test(start_paused = true)]
async fn introduction_rearms_the_timer() {
    let h = harness();
    h.flow.begin(dana()).await.unwrap();

    tokio::time::sleep(TIMEOUT - Duration::from_secs(3600)).await;
    h.flow.handle_message(&introduction()).await.unwrap();

    // Past the first deadline: the stale timer must not fire.
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert!(h.flow.is_pending(&ActorId::new("dana")));
    assert!(h.messenger.group_updates().await.is_empty());

    // The inviter never answers.
    tokio::time::sleep(TIMEOUT).await;
    h.messenger.wait_for_updates(1).await;
    assert!(h.flow.is_empty());
}

#[tokio::test(start_paused = true)]
async fn introduction_without_inviter_asks_again() {
    let h = harness();
    h.flow.begin(dana()).await.unwrap();

    let dm = msg("I'm Dana, I found you online").from("dana").direct().build();
    assert!(h.flow.handle_message(&dm).await.unwrap());
    assert!(h.messenger.last_text().await.unwrap().contains("Who invited you?"));
    assert_eq!(
        h.flow.stage_of(&ActorId::new("dana")),
        Some(OnboardingStage::AwaitingIntro)
    );
}

#[tokio::test(start_paused = true)]
async fn onboard_command_requires_admin_and_reports_status() {
    let h = harness();
    let command = OnboardCommand::new(h.flow.clone(), h.policy.clone());
    assert!(command.admin_only());

    let from_alice = msg("!onboard").mentioning("dana").in_group(ENTRY).build();
    let err = command
        .execute(CommandContext::new("onboard", "\u{FFFC}", &from_alice))
        .await
        .unwrap_err();
    assert!(err.user_message().contains("limited to admins"));
    assert!(h.flow.is_empty());

    let from_admin = msg("!onboard").mentioning("dana").from("admin").in_group(ENTRY).build();
    let reply = command
        .execute(CommandContext::new("onboard", "\u{FFFC} Dana", &from_admin))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.starts_with("Onboarding started for Dana"), "{reply}");
    assert!(h.flow.is_pending(&ActorId::new("dana")));

    let status = msg("!onboard status").from("admin").in_group(ENTRY).build();
    let reply = command
        .execute(CommandContext::new("onboard", "status", &status))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.contains("Dana - awaiting_intro"), "{reply}");

    let cancel = msg("!onboard cancel").mentioning("dana").from("admin").in_group(ENTRY).build();
    let reply = command
        .execute(CommandContext::new("onboard", "cancel \u{FFFC}", &cancel))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.starts_with("Onboarding cancelled"), "{reply}");
    assert!(h.flow.is_empty());
}

#[tokio::test(start_paused = true)]
async fn onboard_outside_the_entry_group_is_refused() {
    let h = harness();
    let command = OnboardCommand::new(h.flow.clone(), h.policy.clone());
    let elsewhere = msg("!onboard")
        .mentioning("dana")
        .from("admin")
        .in_group("main-group")
        .build();
    let reply = command
        .execute(CommandContext::new("onboard", "\u{FFFC} Dana", &elsewhere))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, "!onboard only works in the entry group.");
    assert!(h.flow.is_empty());
    assert!(h.messenger.sent_texts().await.is_empty());

    let direct = msg("!onboard status").from("admin").direct().build();
    let reply = command
        .execute(CommandContext::new("onboard", "status", &direct))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, "!onboard only works in the entry group.");
}

#[tokio::test(start_paused = true)]
async fn onboard_by_phone_number() {
    let h = harness();
    let command = OnboardCommand::new(h.flow.clone(), h.policy.clone());
    let message = msg("!onboard +1 555 0102030").from("admin").in_group(ENTRY).build();
    let reply = command
        .execute(CommandContext::new("onboard", "+15550102030 Walter Skinner", &message))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.starts_with("Onboarding started for Walter Skinner"), "{reply}");
    assert!(h.flow.is_pending(&ActorId::new("+15550102030")));
}
