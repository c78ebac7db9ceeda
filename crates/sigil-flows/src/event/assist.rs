// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation fallback for descriptions the parser could not finish.
//!
//! The generator answers with one JSON object. Its values only fill fields
//! the deterministic parse left empty, and its location is only taken
//! when it is a complete address.

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use sigil_core::TextGenerator;
use tracing::{debug, warn};

use super::draft::EventDraft;

pub const EXTRACTION_PROMPT: &str = "You extract event details from chat messages. \
Answer with a single JSON object and nothing else, using exactly these keys: \
\"name\", \"date\" (YYYY-MM-DD), \"start\" (HH:MM, 24h), \"end\" (HH:MM, 24h), \
\"location\" (full street address including city), \"description\", \
\"timezone\" (IANA name such as America/Chicago). \
Use null for anything the message does not state. Never invent an address.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Extracted {
    name: Option<String>,
    date: Option<String>,
    start: Option<String>,
    end: Option<String>,
    location: Option<String>,
    description: Option<String>,
    timezone: Option<String>,
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Parses the generator's answer, tolerating code fences and chatter
/// around the JSON object.
pub fn parse_reply(reply: &str) -> Option<EventDraft> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let extracted: Extracted = serde_json::from_str(&reply[start..=end]).ok()?;
    let time = |v: Option<String>| text(v).and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M").ok());
    Some(EventDraft {
        name: text(extracted.name),
        date: text(extracted.date).and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        start: time(extracted.start),
        end: time(extracted.end),
        location: text(extracted.location),
        description: text(extracted.description),
        timezone: text(extracted.timezone).and_then(|z| z.parse::<Tz>().ok()),
    })
}

/// Asks `generator` to complete `draft`, keeping the deterministic result
/// whenever the generator fails or returns nothing usable.
pub async fn complete_with(
    generator: &dyn TextGenerator,
    description: &str,
    today: NaiveDate,
    mut draft: EventDraft,
) -> EventDraft {
    let prompt = format!("Today is {today} ({}).\nMessage: {description}", today.format("%A"));
    match generator.generate(EXTRACTION_PROMPT, &prompt).await {
        Ok(reply) => match parse_reply(&reply) {
            Some(extracted) => {
                debug!(missing_before = draft.missing().len(), "merging generated event fields");
                draft.fill_missing(extracted);
            }
            None => debug!("generator reply was not usable"),
        },
        Err(e) => warn!(error = %e, "event extraction fallback failed"),
    }
    draft
}
