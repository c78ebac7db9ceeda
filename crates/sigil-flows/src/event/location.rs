// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Location completeness and follow-up refinement.
//!
//! A location is complete only when it contains a street segment (house
//! number followed by a street name) and at least one locality segment
//! after it, e.g. `100 Main St, Springfield, IL`. A bare street or a bare
//! venue name is solicited again.

use std::sync::LazyLock;

use regex::Regex;

static STREET_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+[A-Za-z]?(?:-\d+)?\s+\p{L}").expect("valid street regex")
});

static REFINEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\s)(?:is\s+located\s+at|is\s+at|located\s+at|it'?s\s+at|address\s+is|address:|at|@)\s+(.+)$",
    )
    .expect("valid refinement regex")
});

fn segments(location: &str) -> Vec<&str> {
    location
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `segment` looks like `<number> <street name>`.
pub fn is_street_segment(segment: &str) -> bool {
    STREET_SEGMENT.is_match(segment.trim())
}

/// Whether the location has a street segment followed by a locality.
pub fn is_complete(location: &str) -> bool {
    let parts = segments(location);
    parts.iter().enumerate().any(|(i, part)| {
        is_street_segment(part)
            && parts[i + 1..]
                .iter()
                .any(|rest| rest.chars().any(char::is_alphabetic))
    })
}

/// Whether the location is only a street, lacking a locality.
pub fn is_bare_street(location: &str) -> bool {
    let parts = segments(location);
    !parts.is_empty() && parts.iter().all(|p| is_street_segment(p))
}

/// Normalizes whitespace and strips trailing sentence punctuation.
pub fn clean(location: &str) -> String {
    location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ',', ';', '!'])
        .trim()
        .to_string()
}

/// Extracts a location from phrases like "is at X" or "located at X".
pub fn refinement(text: &str) -> Option<String> {
    let caps = REFINEMENT.captures(text.trim())?;
    let location = clean(caps.get(1)?.as_str());
    (!location.is_empty()).then_some(location)
}

/// Combines the current location with a follow-up answer.
///
/// A locality sent after a bare street is appended to it. Anything else
/// replaces the current value.
pub fn merge(current: Option<&str>, answer: &str) -> String {
    let answer = clean(answer);
    let answer_has_street = segments(&answer).iter().any(|s| is_street_segment(s));
    match current {
        Some(street) if is_bare_street(street) && !answer_has_street => {
            format!("{}, {answer}", clean(street))
        }
        _ => answer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness() {
        assert!(is_complete("100 Main St, Springfield, IL"));
        assert!(is_complete("Cafe Uno, 12 High St, Springfield"));
        assert!(is_complete("221B Baker Street, London"));
        assert!(!is_complete("the library"));
        assert!(!is_complete("100 Main St"));
        assert!(!is_complete("Cafe Uno, Springfield"));
        assert!(!is_complete("100 Main St, 62701"));
        assert!(!is_complete(""));
    }

    #[test]
    fn refinement_phrases() {
        assert_eq!(
            refinement("library is at 100 Main St, Springfield, IL").as_deref(),
            Some("100 Main St, Springfield, IL")
        );
        assert_eq!(
            refinement("It's located at 5 Elm Rd, Shelbyville.").as_deref(),
            Some("5 Elm Rd, Shelbyville")
        );
        assert_eq!(
            refinement("address is 9 Oak Ave, Capital City").as_deref(),
            Some("9 Oak Ave, Capital City")
        );
        assert_eq!(refinement("Springfield, IL"), None);
    }

    #[test]
    fn merge_appends_locality_to_bare_street() {
        assert_eq!(
            merge(Some("100 Main St"), "Springfield, IL"),
            "100 Main St, Springfield, IL"
        );
        assert_eq!(
            merge(Some("the library"), "100 Main St, Springfield"),
            "100 Main St, Springfield"
        );
        assert_eq!(merge(None, " 7 Elm Rd,  Ogdenville. "), "7 Elm Rd, Ogdenville");
    }
}
