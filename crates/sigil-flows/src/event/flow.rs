// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-actor event drafts: `collecting -> confirming -> created | cancelled`.
//!
//! One draft per actor, bound to the conversation where `!eventadd` ran.
//! A new `!eventadd` replaces the actor's open draft. Drafts idle for
//! longer than the TTL are dropped when the map is next touched.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use sigil_config::model::EventsConfig;
use sigil_core::{
    ActorId, ConversationId, EventSink, Message, Messenger, SigilError, TextGenerator,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::assist;
use super::draft::{EventDefaults, EventDraft, MissingField};
use super::location;
use super::parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStage {
    Collecting,
    Confirming,
}

impl fmt::Display for DraftStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStage::Collecting => write!(f, "collecting"),
            DraftStage::Confirming => write!(f, "confirming"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventSettings {
    pub defaults: EventDefaults,
    pub ttl: Duration,
}

impl EventSettings {
    pub fn from_config(config: &EventsConfig) -> Result<Self, SigilError> {
        let timezone: Tz = config.default_timezone.parse().map_err(|_| {
            SigilError::Config(format!("unknown time zone `{}`", config.default_timezone))
        })?;
        Ok(Self {
            defaults: EventDefaults {
                timezone,
                start_hour: config.default_start_hour,
                duration: ChronoDuration::minutes(i64::from(config.default_duration_mins)),
            },
            ttl: config.draft_ttl(),
        })
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            defaults: EventDefaults::default(),
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
struct DraftState {
    draft: EventDraft,
    stage: DraftStage,
    conversation: ConversationId,
    touched: Instant,
}

enum Step {
    Reply(String),
    Cancel,
    Create,
}

pub struct EventFlow {
    drafts: DashMap<ActorId, DraftState>,
    settings: EventSettings,
    sink: Arc<dyn EventSink>,
    messenger: Arc<dyn Messenger>,
    generator: Option<Arc<dyn TextGenerator>>,
    fixed_today: Option<NaiveDate>,
}

impl EventFlow {
    pub fn new(
        settings: EventSettings,
        sink: Arc<dyn EventSink>,
        messenger: Arc<dyn Messenger>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        Self {
            drafts: DashMap::new(),
            settings,
            sink,
            messenger,
            generator,
            fixed_today: None,
        }
    }

    /// Pins "today" for relative dates.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| {
            Utc::now()
                .with_timezone(&self.settings.defaults.timezone)
                .date_naive()
        })
    }

    /// Parses `description` into a fresh draft for the sender and returns
    /// the first prompt.
    pub async fn start(&self, message: &Message, description: &str) -> Result<String, SigilError> {
        self.purge_expired();
        let today = self.today();

        let mut draft = parser::parse(description, today);
        if !draft.is_complete() {
            if let Some(generator) = &self.generator {
                draft = assist::complete_with(generator.as_ref(), description, today, draft).await;
            }
        }

        let stage = if draft.is_complete() {
            DraftStage::Confirming
        } else {
            DraftStage::Collecting
        };
        let prompt = self.prompt_for(&draft, stage);

        let actor = message.sender.id.clone();
        let previous = self.drafts.insert(
            actor.clone(),
            DraftState {
                draft,
                stage,
                conversation: message.conversation.clone(),
                touched: Instant::now(),
            },
        );
        if previous.is_some() {
            debug!(actor = %actor, "replaced open event draft");
        }
        info!(actor = %actor, conversation = %message.conversation, %stage, "event draft started");
        Ok(prompt)
    }

    /// Feeds a follow-up message into the sender's draft.
    ///
    /// Returns `Ok(false)` when the sender has no live draft in this
    /// conversation.
    pub async fn continue_draft(&self, message: &Message) -> Result<bool, SigilError> {
        self.purge_expired();
        let actor = &message.sender.id;
        let text = message.plain_text();
        let today = self.today();

        let step = {
            let Some(mut state) = self.drafts.get_mut(actor) else {
                return Ok(false);
            };
            if state.conversation != message.conversation {
                return Ok(false);
            }
            state.touched = Instant::now();
            self.advance(&mut state, &text, today)
        };

        match step {
            Step::Reply(reply) => {
                self.messenger.send_reply(message, &reply).await?;
            }
            Step::Cancel => {
                self.drafts.remove(actor);
                info!(actor = %actor, "event draft cancelled");
                self.messenger
                    .send_reply(message, "Event draft cancelled.")
                    .await?;
            }
            Step::Create => self.create(message).await?,
        }
        Ok(true)
    }

    fn advance(&self, state: &mut DraftState, text: &str, today: NaiveDate) -> Step {
        let answer = normalize_answer(text);
        if is_cancel(&answer) || (state.stage == DraftStage::Confirming && is_negative(&answer)) {
            return Step::Cancel;
        }

        match state.stage {
            DraftStage::Confirming if is_affirmative(&answer) => Step::Create,
            DraftStage::Confirming => {
                let correction = fragment(text, today);
                if correction.is_empty() {
                    return Step::Reply(
                        "Reply yes to create the event, no to cancel, or send a correction."
                            .to_string(),
                    );
                }
                let merged_location = correction
                    .location
                    .as_deref()
                    .map(|l| location::merge(state.draft.location.as_deref(), l));
                state.draft.apply_correction(EventDraft {
                    location: merged_location,
                    ..correction
                });
                self.settle(state)
            }
            DraftStage::Collecting => {
                let Some(first_missing) = state.draft.missing().first().copied() else {
                    return self.settle(state);
                };
                let found = fragment(text, today);
                if found.is_empty() {
                    match first_missing {
                        MissingField::Name => {
                            state.draft.name = Some(location::clean(text));
                        }
                        MissingField::Location => {
                            state.draft.location =
                                Some(location::merge(state.draft.location.as_deref(), text));
                        }
                        MissingField::Date => {
                            return Step::Reply(format!(
                                "I couldn't find a date in that. {}",
                                self.question(MissingField::Date, &state.draft)
                            ));
                        }
                    }
                } else {
                    let merged_location = found
                        .location
                        .as_deref()
                        .map(|l| location::merge(state.draft.location.as_deref(), l));
                    state.draft.apply_correction(EventDraft {
                        location: merged_location,
                        ..found
                    });
                }
                self.settle(state)
            }
        }
    }

    /// Moves the draft to the stage its completeness implies and returns
    /// the matching prompt.
    fn settle(&self, state: &mut DraftState) -> Step {
        state.stage = if state.draft.is_complete() {
            DraftStage::Confirming
        } else {
            DraftStage::Collecting
        };
        Step::Reply(self.prompt_for(&state.draft, state.stage))
    }

    async fn create(&self, message: &Message) -> Result<(), SigilError> {
        let actor = &message.sender.id;
        let Some((_, state)) = self
            .drafts
            .remove_if(actor, |_, s| s.stage == DraftStage::Confirming)
        else {
            return Ok(());
        };

        let record = state.draft.to_record(
            &self.settings.defaults,
            actor.clone(),
            state.conversation.clone(),
        )?;
        match self.sink.create_event(&record).await {
            Ok(confirmation) => {
                info!(actor = %actor, name = %record.name, "event created");
                self.messenger
                    .send_reply(
                        message,
                        &format!("✅ Event created: {}\n{confirmation}", record.name),
                    )
                    .await?;
            }
            Err(e) => {
                warn!(actor = %actor, error = %e, "event sink failed");
                self.drafts.entry(actor.clone()).or_insert(DraftState {
                    touched: Instant::now(),
                    ..state
                });
                self.messenger
                    .send_reply(
                        message,
                        &format!(
                            "⚠️ Could not create the event: {}. Reply yes to try again or cancel.",
                            e.user_message()
                        ),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    fn prompt_for(&self, draft: &EventDraft, stage: DraftStage) -> String {
        match stage {
            DraftStage::Confirming => format!(
                "{}\n\nCreate this event? Reply yes to confirm or no to cancel.",
                draft.summary(&self.settings.defaults)
            ),
            DraftStage::Collecting => {
                let missing = draft.missing();
                let question = missing
                    .first()
                    .map(|field| self.question(*field, draft))
                    .unwrap_or_default();
                format!("{question} (Reply cancel to stop.)")
            }
        }
    }

    fn question(&self, field: MissingField, draft: &EventDraft) -> String {
        match field {
            MissingField::Name => "What should the event be called?".to_string(),
            MissingField::Date => {
                "When is it? For example: next Tuesday 7pm, or 2026-11-03 19:00.".to_string()
            }
            MissingField::Location => match draft.location.as_deref() {
                Some(current) if location::is_bare_street(current) => {
                    format!("Which city is {current} in?")
                }
                Some(current) => format!(
                    "I need a full address for {current}, with street and city. \
                     For example: {current} is at 100 Main St, Springfield."
                ),
                None => "Where is it? Please send the full address with street and city."
                    .to_string(),
            },
        }
    }

    /// Drops drafts idle for longer than the TTL.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.settings.ttl;
        let before = self.drafts.len();
        self.drafts.retain(|_, state| state.touched.elapsed() < ttl);
        let purged = before.saturating_sub(self.drafts.len());
        if purged > 0 {
            debug!(purged, "expired event drafts dropped");
        }
        purged
    }

    pub fn stage(&self, actor: &ActorId) -> Option<DraftStage> {
        self.drafts.get(actor).map(|s| s.stage)
    }

    pub fn draft(&self, actor: &ActorId) -> Option<EventDraft> {
        self.drafts.get(actor).map(|s| s.draft.clone())
    }

    pub fn cancel(&self, actor: &ActorId) -> bool {
        self.drafts.remove(actor).is_some()
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

/// Follow-up fields found in `text`, including "address is X" phrasing.
fn fragment(text: &str, today: NaiveDate) -> EventDraft {
    let mut found = parser::parse_fragment(text, today);
    if found.is_empty() {
        found.location = location::refinement(text);
    }
    found
}

fn normalize_answer(text: &str) -> String {
    text.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase()
}

fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer,
        "yes" | "y" | "yep" | "yeah" | "confirm" | "ok" | "okay" | "sure" | "👍"
    )
}

fn is_negative(answer: &str) -> bool {
    matches!(answer, "no" | "n" | "nope")
}

fn is_cancel(answer: &str) -> bool {
    matches!(answer, "cancel" | "stop" | "abort")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_words() {
        assert!(is_affirmative(&normalize_answer("Yes!")));
        assert!(is_affirmative(&normalize_answer(" OK ")));
        assert!(is_negative(&normalize_answer("no.")));
        assert!(is_cancel(&normalize_answer("Cancel")));
        assert!(!is_affirmative(&normalize_answer("yes please move it")));
    }

    #[test]
    fn settings_reject_unknown_zone() {
        let config = EventsConfig {
            default_timezone: "Mars/Olympus".into(),
            ..Default::default()
        };
        assert!(EventSettings::from_config(&config).is_err());
        let ok = EventSettings::from_config(&EventsConfig::default()).unwrap();
        assert_eq!(ok.ttl, Duration::from_secs(3600));
    }
}
