// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event drafts driven through `!eventadd` and follow-up messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use sigil_commands::{Command, CommandContext};
use sigil_core::{ActorId, Message};
use sigil_flows::event::{DraftStage, EventAddCommand, EventDefaults, EventFlow, EventSettings};
use sigil_test_utils::{msg, MockMessenger, MockTextGenerator, RecordingEventSink};

struct Harness {
    messenger: Arc<MockMessenger>,
    sink: Arc<RecordingEventSink>,
    flow: Arc<EventFlow>,
    command: EventAddCommand,
}

fn friday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn harness() -> Harness {
    harness_with(EventSettings::default())
}

fn harness_with(settings: EventSettings) -> Harness {
    let messenger = Arc::new(MockMessenger::new());
    let sink = Arc::new(RecordingEventSink::new());
    let flow = Arc::new(
        EventFlow::new(settings, sink.clone(), messenger.clone(), None).with_today(friday()),
    );
    Harness {
        command: EventAddCommand::new(flow.clone()),
        messenger,
        sink,
        flow,
    }
}

async fn eventadd(h: &Harness, message: &Message) -> String {
    let args = message.text.trim_start_matches("!eventadd").trim().to_string();
    h.command
        .execute(CommandContext::new("eventadd", &args, message))
        .await
        .unwrap()
        .unwrap()
}

fn alice() -> ActorId {
    ActorId::new("alice")
}

#[tokio::test]
async fn vague_location_is_refined_then_confirmed_and_created() {
    let h = harness();

    let prompt = eventadd(&h, &msg("!eventadd Meetup next Tuesday at the library").build()).await;
    assert!(prompt.contains("I need a full address for the library"), "{prompt}");
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Collecting));

    let handled = h
        .flow
        .continue_draft(&msg("library is at 100 Main St, Springfield, IL").build())
        .await
        .unwrap();
    assert!(handled);
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Confirming));
    let confirm = h.messenger.last_text().await.unwrap();
    assert!(confirm.contains("📍 100 Main St, Springfield, IL"), "{confirm}");
    assert!(confirm.contains("Tue Oct 20, 2026 6:00 PM"), "{confirm}");
    assert!(confirm.ends_with("Reply yes to confirm or no to cancel."));

    assert!(h.flow.continue_draft(&msg("yes").build()).await.unwrap());
    assert_eq!(
        h.messenger.last_text().await.unwrap(),
        "✅ Event created: Meetup\nevent #1"
    );
    assert!(h.flow.is_empty());

    let events = h.sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].location, "100 Main St, Springfield, IL");
    assert_eq!(
        events[0].starts_at,
        Utc.with_ymd_and_hms(2026, 10, 20, 18, 0, 0).unwrap()
    );
    assert_eq!(events[0].organizer, alice());
}

#[tokio::test]
async fn cancel_clears_the_draft() {
    let h = harness();
    eventadd(&h, &msg("!eventadd Meetup next Tuesday at the library").build()).await;

    assert!(h.flow.continue_draft(&msg("cancel").build()).await.unwrap());
    assert_eq!(h.messenger.last_text().await.unwrap(), "Event draft cancelled.");
    assert!(h.flow.is_empty());

    // Nothing left to continue.
    assert!(!h.flow.continue_draft(&msg("yes").build()).await.unwrap());
    assert!(h.sink.events().await.is_empty());
}

#[tokio::test]
async fn no_while_confirming_cancels() {
    let h = harness();
    let prompt = eventadd(
        &h,
        &msg("!eventadd Board games 2026-11-03 7pm at 12 High St, Springfield").build(),
    )
    .await;
    assert!(prompt.contains("Create this event?"), "{prompt}");

    assert!(h.flow.continue_draft(&msg("no").build()).await.unwrap());
    assert!(h.flow.is_empty());
    assert!(h.sink.events().await.is_empty());
}

#[tokio::test]
async fn drafts_are_per_actor_and_per_conversation() {
    let h = harness();
    eventadd(&h, &msg("!eventadd Meetup next Tuesday at the library").build()).await;

    // Someone else answering is not part of Alice's draft.
    let bob = msg("yes").from("bob").build();
    assert!(!h.flow.continue_draft(&bob).await.unwrap());

    // Alice in another conversation is not either.
    let elsewhere = msg("100 Main St, Springfield").in_group("other").build();
    assert!(!h.flow.continue_draft(&elsewhere).await.unwrap());
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Collecting));
}

#[tokio::test]
async fn missing_date_is_asked_for() {
    let h = harness();
    let prompt = eventadd(&h, &msg("!eventadd Picnic at 5 Park Rd, Springfield").build()).await;
    assert!(prompt.starts_with("When is it?"), "{prompt}");

    h.flow.continue_draft(&msg("sometime").build()).await.unwrap();
    assert!(h
        .messenger
        .last_text()
        .await
        .unwrap()
        .starts_with("I couldn't find a date in that."));

    h.flow
        .continue_draft(&msg("tomorrow at 3pm").build())
        .await
        .unwrap();
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Confirming));
    let draft = h.flow.draft(&alice()).unwrap();
    assert_eq!(draft.date, NaiveDate::from_ymd_opt(2026, 10, 17));
    assert_eq!(draft.location.as_deref(), Some("5 Park Rd, Springfield"));
}

#[tokio::test]
async fn sink_failure_keeps_the_draft_for_a_retry() {
    let h = harness();
    eventadd(
        &h,
        &msg("!eventadd Board games 2026-11-03 7pm at 12 High St, Springfield").build(),
    )
    .await;

    h.sink.fail(true);
    h.flow.continue_draft(&msg("yes").build()).await.unwrap();
    assert!(h
        .messenger
        .last_text()
        .await
        .unwrap()
        .starts_with("⚠️ Could not create the event"));
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Confirming));

    h.sink.fail(false);
    h.flow.continue_draft(&msg("yes").build()).await.unwrap();
    assert_eq!(h.sink.events().await.len(), 1);
    assert!(h.flow.is_empty());
}

#[tokio::test(start_paused = true)]
async fn idle_drafts_expire() {
    let h = harness();
    eventadd(&h, &msg("!eventadd Meetup next Tuesday at the library").build()).await;

    tokio::time::advance(Duration::from_secs(3601)).await;
    assert!(!h.flow.continue_draft(&msg("yes").build()).await.unwrap());
    assert!(h.flow.is_empty());
}

#[tokio::test]
async fn generator_fills_what_the_parser_missed() {
    let messenger = Arc::new(MockMessenger::new());
    let sink = Arc::new(RecordingEventSink::new());
    let generator = Arc::new(MockTextGenerator::new());
    generator
        .push_reply(
            r#"{"name":"Trivia night","date":"2026-10-22","start":"19:30","location":"12 High St, Springfield"}"#,
        )
        .await;
    let flow = Arc::new(
        EventFlow::new(
            EventSettings::default(),
            sink,
            messenger,
            Some(generator.clone()),
        )
        .with_today(friday()),
    );

    let message = msg("!eventadd trivia thursday evening at the pub").build();
    let prompt = flow
        .start(&message, "trivia thursday evening at the pub")
        .await
        .unwrap();
    assert!(prompt.contains("Create this event?"), "{prompt}");
    let draft = flow.draft(&alice()).unwrap();
    assert_eq!(draft.location.as_deref(), Some("12 High St, Springfield"));
}

fn chicago() -> EventSettings {
    EventSettings {
        defaults: EventDefaults {
            timezone: chrono_tz::America::Chicago,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn default_zone_is_shown_and_used_when_none_is_named() {
    let h = harness_with(chicago());
    let prompt = eventadd(
        &h,
        &msg("!eventadd Board games 2026-11-03 7pm at 12 High St, Springfield").build(),
    )
    .await;
    assert!(prompt.contains("Tue Nov 3, 2026 7:00 PM to 9:00 PM (America/Chicago)"), "{prompt}");

    assert!(h.flow.continue_draft(&msg("yes").build()).await.unwrap());
    let events = h.sink.events().await;
    assert_eq!(events[0].timezone, "America/Chicago");
    assert_eq!(
        events[0].starts_at,
        Utc.with_ymd_and_hms(2026, 11, 4, 1, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn named_zone_overrides_the_default() {
    let h = harness_with(chicago());
    let prompt = eventadd(
        &h,
        &msg("!eventadd Board games 2026-11-03 7pm EST at 12 High St, Springfield").build(),
    )
    .await;
    assert!(prompt.contains("(America/New_York)"), "{prompt}");
    assert!(prompt.contains("📅 Board games"), "{prompt}");

    assert!(h.flow.continue_draft(&msg("yes").build()).await.unwrap());
    let events = h.sink.events().await;
    assert_eq!(events[0].timezone, "America/New_York");
    assert_eq!(
        events[0].starts_at,
        Utc.with_ymd_and_hms(2026, 11, 4, 0, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn zone_correction_while_confirming() {
    let h = harness();
    eventadd(
        &h,
        &msg("!eventadd Board games 2026-11-03 7pm at 12 High St, Springfield").build(),
    )
    .await;
    assert!(h.flow.continue_draft(&msg("Europe/London").build()).await.unwrap());
    let confirm = h.messenger.last_text().await.unwrap();
    assert!(confirm.contains("(Europe/London)"), "{confirm}");
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Confirming));
}

#[tokio::test]
async fn second_eventadd_replaces_the_open_draft() {
    let h = harness();
    eventadd(&h, &msg("!eventadd Meetup next Tuesday at the library").build()).await;
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Collecting));

    let prompt = eventadd(
        &h,
        &msg("!eventadd Board games 2026-11-03 7pm at 12 High St, Springfield").build(),
    )
    .await;
    assert!(prompt.contains("📅 Board games"), "{prompt}");
    assert_eq!(h.flow.len(), 1);
    assert_eq!(h.flow.stage(&alice()), Some(DraftStage::Confirming));

    assert!(h.flow.continue_draft(&msg("yes").build()).await.unwrap());
    let events = h.sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "Board games");
    assert_eq!(events[0].location, "12 High St, Springfield");
    assert!(h.flow.is_empty());
}
