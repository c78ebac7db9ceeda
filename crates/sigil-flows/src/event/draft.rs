// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-progress event record and its completeness rules.

use std::fmt;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sigil_core::types::EventRecord;
use sigil_core::{ActorId, ConversationId, SigilError};

use super::location;

/// Values applied when a description leaves something out.
#[derive(Debug, Clone, Copy)]
pub struct EventDefaults {
    pub timezone: Tz,
    pub start_hour: u32,
    pub duration: ChronoDuration,
}

impl Default for EventDefaults {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            start_hour: 18,
            duration: ChronoDuration::minutes(120),
        }
    }
}

impl EventDefaults {
    fn default_start(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.start_hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN)
    }
}

/// A required field the draft still lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Name,
    Date,
    /// No location, or one without street and locality.
    Location,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingField::Name => write!(f, "name"),
            MissingField::Date => write!(f, "date"),
            MissingField::Location => write!(f, "location"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Zone named in the description. [`EventDefaults::timezone`] otherwise.
    pub timezone: Option<Tz>,
}

impl EventDraft {
    /// Missing required fields in the order they are asked for.
    pub fn missing(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push(MissingField::Name);
        }
        if self.date.is_none() {
            missing.push(MissingField::Date);
        }
        if !self.has_complete_location() {
            missing.push(MissingField::Location);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn has_complete_location(&self) -> bool {
        self.location.as_deref().is_some_and(location::is_complete)
    }

    /// The zone the draft's wall-clock times are in.
    pub fn zone(&self, defaults: &EventDefaults) -> Tz {
        self.timezone.unwrap_or(defaults.timezone)
    }

    /// Whether any field is set.
    pub fn is_empty(&self) -> bool {
        *self == EventDraft::default()
    }

    /// Fills fields this draft lacks from `other`.
    ///
    /// A location is taken only when ours is absent or incomplete and
    /// `other`'s is complete.
    pub fn fill_missing(&mut self, other: EventDraft) {
        if self.name.is_none() {
            self.name = other.name;
        }
        if self.date.is_none() {
            self.date = other.date;
        }
        if self.start.is_none() {
            self.start = other.start;
            if self.end.is_none() {
                self.end = other.end;
            }
        }
        if self.description.is_none() {
            self.description = other.description;
        }
        if self.timezone.is_none() {
            self.timezone = other.timezone;
        }
        if !self.has_complete_location()
            && other.location.as_deref().is_some_and(location::is_complete)
        {
            self.location = other.location;
        }
    }

    /// Overrides fields with every value `other` carries.
    pub fn apply_correction(&mut self, other: EventDraft) {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.date.is_some() {
            self.date = other.date;
        }
        if other.start.is_some() {
            self.start = other.start;
            self.end = other.end;
        }
        if other.location.is_some() {
            self.location = other.location;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.timezone.is_some() {
            self.timezone = other.timezone;
        }
    }

    fn local_bounds(&self, defaults: &EventDefaults) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let date = self.date?;
        let start = date.and_time(self.start.unwrap_or_else(|| defaults.default_start()));
        let end = match self.end {
            Some(end_time) => {
                let end = date.and_time(end_time);
                if end <= start {
                    end + ChronoDuration::days(1)
                } else {
                    end
                }
            }
            None => start + defaults.duration,
        };
        Some((start, end))
    }

    /// Converts a complete draft into the record handed to the event sink.
    pub fn to_record(
        &self,
        defaults: &EventDefaults,
        organizer: ActorId,
        conversation: ConversationId,
    ) -> Result<EventRecord, SigilError> {
        let incomplete = |field: MissingField| {
            SigilError::handler("eventadd", format!("the event has no {field} yet"))
        };
        let name = self.name.clone().ok_or_else(|| incomplete(MissingField::Name))?;
        let location = self
            .location
            .clone()
            .filter(|l| location::is_complete(l))
            .ok_or_else(|| incomplete(MissingField::Location))?;
        let (start, end) = self
            .local_bounds(defaults)
            .ok_or_else(|| incomplete(MissingField::Date))?;

        let tz = self.zone(defaults);
        let localize = |naive: NaiveDateTime| {
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| {
                    SigilError::handler(
                        "eventadd",
                        format!("{naive} does not exist in {}", tz.name()),
                    )
                })
        };

        Ok(EventRecord {
            name,
            starts_at: localize(start)?,
            ends_at: localize(end)?,
            timezone: tz.name().to_string(),
            location,
            description: self.description.clone(),
            organizer,
            conversation,
        })
    }

    /// Human-readable summary used in confirmation prompts.
    pub fn summary(&self, defaults: &EventDefaults) -> String {
        let mut lines = vec![format!(
            "📅 {}",
            self.name.as_deref().unwrap_or("(unnamed event)")
        )];
        match self.local_bounds(defaults) {
            Some((start, end)) => lines.push(format!(
                "🕒 {} to {} ({})",
                start.format("%a %b %-d, %Y %-I:%M %p"),
                if end.date() == start.date() {
                    end.format("%-I:%M %p").to_string()
                } else {
                    end.format("%a %b %-d %-I:%M %p").to_string()
                },
                self.zone(defaults).name()
            )),
            None => lines.push("🕒 (no date yet)".to_string()),
        }
        lines.push(format!(
            "📍 {}",
            self.location.as_deref().unwrap_or("(no location yet)")
        ));
        if let Some(description) = &self.description {
            lines.push(format!("📝 {description}"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> EventDraft {
        EventDraft {
            name: Some("Meetup".into()),
            date: NaiveDate::from_ymd_opt(2026, 11, 3),
            start: None,
            end: None,
            location: Some("100 Main St, Springfield, IL".into()),
            description: None,
            timezone: None,
        }
    }

    #[test]
    fn missing_fields_in_prompt_order() {
        let draft = EventDraft {
            location: Some("the library".into()),
            ..Default::default()
        };
        assert_eq!(
            draft.missing(),
            vec![MissingField::Name, MissingField::Date, MissingField::Location]
        );
        assert!(complete().is_complete());
    }

    #[test]
    fn record_uses_defaults_and_timezone() {
        let defaults = EventDefaults {
            timezone: chrono_tz::America::Chicago,
            ..Default::default()
        };
        let record = complete()
            .to_record(&defaults, ActorId::new("alice"), ConversationId::Group("g".into()))
            .unwrap();
        // 18:00 CST is 00:00 UTC the next day.
        assert_eq!(record.starts_at.to_rfc3339(), "2026-11-04T00:00:00+00:00");
        assert_eq!(record.ends_at.to_rfc3339(), "2026-11-04T02:00:00+00:00");
        assert_eq!(record.timezone, "America/Chicago");
    }

    #[test]
    fn end_before_start_rolls_over() {
        let mut draft = complete();
        draft.start = NaiveTime::from_hms_opt(22, 0, 0);
        draft.end = NaiveTime::from_hms_opt(1, 0, 0);
        let record = draft
            .to_record(
                &EventDefaults::default(),
                ActorId::new("alice"),
                ConversationId::Group("g".into()),
            )
            .unwrap();
        assert_eq!(record.ends_at.to_rfc3339(), "2026-11-04T01:00:00+00:00");
    }

    #[test]
    fn fill_missing_keeps_existing_values() {
        let mut draft = EventDraft {
            name: Some("Meetup".into()),
            location: Some("the library".into()),
            ..Default::default()
        };
        draft.fill_missing(EventDraft {
            name: Some("Other".into()),
            date: NaiveDate::from_ymd_opt(2026, 1, 2),
            location: Some("somewhere".into()),
            ..Default::default()
        });
        assert_eq!(draft.name.as_deref(), Some("Meetup"));
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2026, 1, 2));
        assert_eq!(draft.location.as_deref(), Some("the library"));

        draft.fill_missing(EventDraft {
            location: Some("1 Elm St, Springfield".into()),
            ..Default::default()
        });
        assert_eq!(draft.location.as_deref(), Some("1 Elm St, Springfield"));
    }

    #[test]
    fn summary_mentions_every_field() {
        let summary = complete().summary(&EventDefaults::default());
        assert!(summary.contains("Meetup"));
        assert!(summary.contains("Tue Nov 3, 2026 6:00 PM to 8:00 PM (UTC)"));
        assert!(summary.contains("100 Main St, Springfield, IL"));
    }

    #[test]
    fn named_zone_overrides_the_default() {
        let mut draft = complete();
        draft.timezone = Some(chrono_tz::America::New_York);
        let defaults = EventDefaults {
            timezone: chrono_tz::America::Chicago,
            ..Default::default()
        };
        let record = draft
            .to_record(&defaults, ActorId::new("alice"), ConversationId::Group("g".into()))
            .unwrap();
        // 18:00 EST is 23:00 UTC.
        assert_eq!(record.starts_at.to_rfc3339(), "2026-11-03T23:00:00+00:00");
        assert_eq!(record.timezone, "America/New_York");
        assert!(draft.summary(&defaults).contains("(America/New_York)"));
    }

    #[test]
    fn correction_replaces_the_zone_and_fill_keeps_it() {
        let mut draft = complete();
        draft.fill_missing(EventDraft {
            timezone: Some(chrono_tz::Europe::London),
            ..Default::default()
        });
        assert_eq!(draft.timezone, Some(chrono_tz::Europe::London));
        draft.fill_missing(EventDraft {
            timezone: Some(Tz::UTC),
            ..Default::default()
        });
        assert_eq!(draft.timezone, Some(chrono_tz::Europe::London));
        draft.apply_correction(EventDraft {
            timezone: Some(Tz::UTC),
            ..Default::default()
        });
        assert_eq!(draft.timezone, Some(Tz::UTC));
    }
}
