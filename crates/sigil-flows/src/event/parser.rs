// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic extraction of event fields from free text.
//!
//! Dates and times are located first and cut out of the text. What remains
//! is split into `<name> at <location> - <description>`.
//!
//! `next <weekday>` is the first such day strictly after today, while a
//! bare or `this <weekday>` may be today.
//!
//! A zone is recognized as an IANA name (`America/Chicago`) or one of the
//! uppercase abbreviations in [`zone_for_abbreviation`]. Abbreviations that
//! double as US state codes (`CT`, `MT`) are not zones.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use regex::{Captures, Regex};

use super::draft::EventDraft;
use super::location;

static ZONE_ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in\s+)?([A-Z]{1,3}[SD]T|UTC|GMT|CET|EET|WET|BST|JST)\b")
        .expect("valid zone abbreviation regex")
});

static IANA_ZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in\s+)?([A-Z][A-Za-z]+(?:/[A-Za-z][A-Za-z0-9_+\-]*)+)")
        .expect("valid zone name regex")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:on\s+)?(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex")
});

static RELATIVE_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:on\s+)?(today|tonight|tomorrow)\b").expect("valid relative day regex")
});

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:on\s+)?(?:(next|this)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid weekday regex")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:on\s+)?(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
    )
    .expect("valid month-day regex")
});

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<from>\bfrom\s+)?(?:\bat\s+|@\s*)?\b(?P<sh>\d{1,2})(?::(?P<sm>\d{2}))?\s*(?P<smer>am|pm)?\s*(?:-|–|\bto\b|\buntil\b|\btill\b)\s*(?P<eh>\d{1,2})(?::(?P<em>\d{2}))?\s*(?P<emer>am|pm)?\b",
    )
    .expect("valid time range regex")
});

static NAMED_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bat\s+|@\s*)?\b(noon|midday|midnight)\b").expect("valid named time regex")
});

static MERIDIEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bat\s+|@\s*)?\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b")
        .expect("valid 12h time regex")
});

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bat\s+|@\s*)?\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid 24h time regex")
});

static LOCATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)(?:at|@)\s+").expect("valid location marker regex"));

static DESCRIPTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s[-–]\s|:\s").expect("valid description marker regex"));

/// Parses a full event description relative to `today`.
pub fn parse(text: &str, today: NaiveDate) -> EventDraft {
    let mut rest = text.trim().to_string();
    let timezone = take_timezone(&mut rest);
    let mut draft = EventDraft {
        date: take_date(&mut rest, today),
        timezone,
        ..Default::default()
    };
    if let Some((start, end)) = take_time(&mut rest) {
        draft.start = Some(start);
        draft.end = end;
    }

    let rest = collapse(&rest);
    let (head, tail) = match DESCRIPTION_MARKER.find(&rest) {
        Some(m) => (&rest[..m.start()], Some(rest[m.end()..].trim())),
        None => (rest.as_str(), None),
    };

    let (name, loc) = split_location(head);
    draft.name = non_empty(name);
    draft.location = loc.map(location::clean).filter(|l| !l.is_empty());
    draft.description = tail.and_then(non_empty);

    // "Meetup: talk at 1 Elm St, Springfield" names the place after the colon.
    if draft.location.is_none() {
        if let Some(description) = draft.description.take() {
            let (before, loc) = split_location(&description);
            draft.location = loc.map(location::clean).filter(|l| !l.is_empty());
            draft.description = non_empty(before);
        }
    }
    draft
}

/// Parses a follow-up message. Never infers a name.
pub fn parse_fragment(text: &str, today: NaiveDate) -> EventDraft {
    let mut draft = parse(text, today);
    draft.name = None;
    draft.description = None;
    draft
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches([',', ';', '.']).trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cut(text: &mut String, range: std::ops::Range<usize>) {
    text.replace_range(range, " ");
}

fn split_location(head: &str) -> (&str, Option<&str>) {
    match LOCATION_MARKER.find(head) {
        Some(m) => (&head[..m.start()], Some(&head[m.end()..])),
        None => (head, None),
    }
}

/// Maps a zone abbreviation to the zone it is commonly used for.
pub fn zone_for_abbreviation(abbreviation: &str) -> Option<Tz> {
    let zone = match abbreviation {
        "UTC" | "GMT" => Tz::UTC,
        "EST" | "EDT" => Tz::America__New_York,
        "CST" | "CDT" => Tz::America__Chicago,
        "MST" | "MDT" => Tz::America__Denver,
        "PST" | "PDT" => Tz::America__Los_Angeles,
        "AKST" | "AKDT" => Tz::America__Anchorage,
        "HST" => Tz::Pacific__Honolulu,
        "BST" | "WET" | "WEST" => Tz::Europe__London,
        "CET" | "CEST" => Tz::Europe__Berlin,
        "EET" | "EEST" => Tz::Europe__Athens,
        "JST" => Tz::Asia__Tokyo,
        "AEST" | "AEDT" => Tz::Australia__Sydney,
        _ => return None,
    };
    Some(zone)
}

fn take_timezone(text: &mut String) -> Option<Tz> {
    let snapshot = text.clone();
    for caps in IANA_ZONE.captures_iter(&snapshot) {
        if let Ok(zone) = caps[1].parse::<Tz>() {
            if let Some(span) = caps.get(0).map(|m| m.range()) {
                cut(text, span);
            }
            return Some(zone);
        }
    }
    for caps in ZONE_ABBREVIATION.captures_iter(&snapshot) {
        if let Some(zone) = zone_for_abbreviation(&caps[1]) {
            if let Some(span) = caps.get(0).map(|m| m.range()) {
                cut(text, span);
            }
            return Some(zone);
        }
    }
    None
}

fn take_date(text: &mut String, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if date.is_some() {
            let span = caps.get(0).map(|m| m.range());
            if let Some(span) = span {
                cut(text, span);
            }
            return date;
        }
    }

    if let Some(caps) = RELATIVE_DAY.captures(text) {
        let date = match caps[1].to_lowercase().as_str() {
            "tomorrow" => today.checked_add_days(Days::new(1)),
            _ => Some(today),
        };
        if let Some(span) = caps.get(0).map(|m| m.range()) {
            cut(text, span);
        }
        return date;
    }

    if let Some(caps) = WEEKDAY.captures(text) {
        let date = weekday_date(&caps, today);
        if let Some(span) = caps.get(0).map(|m| m.range()) {
            cut(text, span);
        }
        return date;
    }

    for caps in MONTH_DAY.captures_iter(&text.clone()) {
        if let Some(date) = month_day_date(&caps, today) {
            if let Some(span) = caps.get(0).map(|m| m.range()) {
                cut(text, span);
            }
            return Some(date);
        }
    }
    None
}

fn weekday_date(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let target: Weekday = caps[2].parse().ok()?;
    let offset = (7 + target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let is_next = caps
        .get(1)
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("next"));
    let offset = if is_next && offset == 0 { 7 } else { offset };
    today.checked_add_days(Days::new(offset as u64))
}

fn month_day_date(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    match caps.get(3) {
        Some(year) => NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if this_year < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(this_year)
            }
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Converts an hour/minute pair, honoring an optional am/pm suffix.
fn clock(hour: u32, minute: u32, meridiem: Option<&str>) -> Option<NaiveTime> {
    let hour = match meridiem.map(str::to_lowercase).as_deref() {
        Some(m) if (1..=12).contains(&hour) => {
            if m == "pm" {
                hour % 12 + 12
            } else {
                hour % 12
            }
        }
        Some(_) => return None,
        None => hour,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn take_time(text: &mut String) -> Option<(NaiveTime, Option<NaiveTime>)> {
    let snapshot = text.clone();

    for caps in TIME_RANGE.captures_iter(&snapshot) {
        if let Some(range) = time_range(&caps) {
            if let Some(span) = caps.get(0).map(|m| m.range()) {
                cut(text, span);
            }
            return Some(range);
        }
    }

    if let Some(caps) = NAMED_TIME.captures(&snapshot) {
        let time = match caps[1].to_lowercase().as_str() {
            "midnight" => NaiveTime::MIN,
            _ => NaiveTime::from_hms_opt(12, 0, 0)?,
        };
        if let Some(span) = caps.get(0).map(|m| m.range()) {
            cut(text, span);
        }
        return Some((time, None));
    }

    for caps in MERIDIEM_TIME.captures_iter(&snapshot) {
        let minute = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok());
        let time = caps[1]
            .parse()
            .ok()
            .zip(minute)
            .and_then(|(h, m)| clock(h, m, Some(&caps[3])));
        if let (Some(time), Some(span)) = (time, caps.get(0).map(|m| m.range())) {
            cut(text, span);
            return Some((time, None));
        }
    }

    if let Some(caps) = CLOCK_TIME.captures(&snapshot) {
        let time = clock(caps[1].parse().ok()?, caps[2].parse().ok()?, None)?;
        if let Some(span) = caps.get(0).map(|m| m.range()) {
            cut(text, span);
        }
        return Some((time, None));
    }
    None
}

fn time_range(caps: &Captures<'_>) -> Option<(NaiveTime, Option<NaiveTime>)> {
    let start_meridiem = caps.name("smer").map(|m| m.as_str());
    let end_meridiem = caps.name("emer").map(|m| m.as_str());
    let has_minutes = caps.name("sm").is_some() || caps.name("em").is_some();
    // "12-14 High St" is a street number, not a time.
    if start_meridiem.is_none() && end_meridiem.is_none() && !has_minutes && caps.name("from").is_none()
    {
        return None;
    }

    let sh: u32 = caps.name("sh")?.as_str().parse().ok()?;
    let sm: u32 = caps.name("sm").map_or(Some(0), |m| m.as_str().parse().ok())?;
    let eh: u32 = caps.name("eh")?.as_str().parse().ok()?;
    let em: u32 = caps.name("em").map_or(Some(0), |m| m.as_str().parse().ok())?;

    let end = clock(eh, em, end_meridiem)?;
    let start = match (start_meridiem, end_meridiem) {
        (Some(m), _) => clock(sh, sm, Some(m))?,
        // "7-9pm": the start borrows the end's suffix unless that puts it after the end.
        (None, Some(m)) => match clock(sh, sm, Some(m)) {
            Some(t) if t <= end => t,
            _ => {
                let other = if m.eq_ignore_ascii_case("pm") { "am" } else { "pm" };
                clock(sh, sm, Some(other))?
            }
        },
        (None, None) => clock(sh, sm, None)?,
    };
    Some((start, Some(end)))
}
