// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reads a newcomer's introduction.
//!
//! Two layouts are understood: labelled lines (`name: ...`,
//! `invited by: ...`, `found us: ...`) and numbered answers in the order
//! the prompt asks for them. The inviter is taken from an @-mention, or
//! from a phone number or account uuid written in the text.

use std::sync::LazyLock;

use regex::Regex;
use sigil_core::types::{Sender, MENTION_PLACEHOLDER};
use sigil_core::{ActorId, BotIdentity, Message};

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([1-9])\s*[.)]\s*(.*)$").expect("valid numbered answer regex")
});

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s().-]{5,}\d").expect("valid phone regex"));

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b")
        .expect("valid uuid regex")
});

/// Who the newcomer says invited them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviterRef {
    pub id: ActorId,
    pub number: Option<String>,
    pub name: Option<String>,
}

impl InviterRef {
    pub fn matches(&self, sender: &Sender) -> bool {
        sender.matches(self.id.as_str())
            || self.number.as_deref().is_some_and(|n| sender.matches(n))
    }

    pub fn matches_parts(&self, actor: &ActorId, number: Option<&str>) -> bool {
        let candidates = [Some(actor.as_str()), number];
        candidates
            .into_iter()
            .flatten()
            .any(|c| c == self.id.as_str() || self.number.as_deref() == Some(c))
    }

    /// Identifier used in group updates: the number when known.
    pub fn address(&self) -> &str {
        self.number.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.address())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Introduction {
    pub name: Option<String>,
    pub inviter: Option<InviterRef>,
    /// Inviter text that could not be resolved to an account.
    pub inviter_hint: Option<String>,
    pub found_via: Option<String>,
}

enum Field {
    Name,
    Inviter,
    FoundVia,
}

fn classify(label: &str) -> Option<Field> {
    let label = label.trim().to_lowercase();
    if label.contains("invit") || label.contains("vouch") || label.contains("sponsor") {
        Some(Field::Inviter)
    } else if label.contains("name") {
        Some(Field::Name)
    } else if ["found", "find", "how", "source"]
        .iter()
        .any(|word| label.contains(word))
    {
        Some(Field::FoundVia)
    } else {
        None
    }
}

fn clean(value: &str) -> Option<String> {
    let value = value
        .replace(MENTION_PLACEHOLDER, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let value = value.trim_end_matches(['.', ',', ';']).trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Normalizes a written phone number to `+<digits>`.
pub fn normalize_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (7..=15).contains(&digits.len()).then(|| format!("+{digits}"))
}

/// Finds a phone number or uuid in free text.
pub fn address_in(text: &str) -> Option<InviterRef> {
    if let Some(uuid) = UUID.find(text) {
        return Some(InviterRef {
            id: ActorId::new(uuid.as_str().to_lowercase()),
            number: None,
            name: None,
        });
    }
    PHONE
        .find_iter(text)
        .find_map(|m| normalize_number(m.as_str()))
        .map(|number| InviterRef {
            id: ActorId::new(number.clone()),
            number: Some(number),
            name: None,
        })
}

/// Parses `message` as an introduction. Neither the bot nor the sender
/// is ever taken as the inviter.
pub fn parse_introduction(message: &Message, bot: &BotIdentity) -> Introduction {
    let mut intro = Introduction::default();
    let mut inviter_text: Option<String> = None;
    let mut numbered: Vec<(u32, String)> = Vec::new();

    for line in message.text.lines() {
        if let Some((label, value)) = line.split_once(':') {
            if let Some(field) = classify(label.trim_start_matches(|c: char| {
                c.is_ascii_digit() || c == '.' || c == ')' || c.is_whitespace()
            })) {
                match field {
                    Field::Name if intro.name.is_none() => intro.name = clean(value),
                    Field::Inviter if inviter_text.is_none() => {
                        inviter_text = Some(value.to_string());
                    }
                    Field::FoundVia if intro.found_via.is_none() => intro.found_via = clean(value),
                    _ => {}
                }
                continue;
            }
        }
        if let Some(caps) = NUMBERED.captures(line) {
            if let Ok(position) = caps[1].parse::<u32>() {
                numbered.push((position, caps[2].to_string()));
            }
        }
    }

    for (position, value) in numbered {
        match position {
            1 if intro.name.is_none() => intro.name = clean(&value),
            2 if inviter_text.is_none() => inviter_text = Some(value),
            3 if intro.found_via.is_none() => intro.found_via = clean(&value),
            _ => {}
        }
    }

    let subject = &message.sender;
    let mention = message.mentions.iter().find(|m| {
        !bot.is_self(m.actor.as_str())
            && !m.number.as_deref().is_some_and(|n| bot.is_self(n))
            && !subject.matches(m.actor.as_str())
    });

    intro.inviter = match mention {
        Some(m) => Some(InviterRef {
            id: m.actor.clone(),
            number: m.number.clone(),
            name: m.name.clone(),
        }),
        None => inviter_text
            .as_deref()
            .and_then(address_in)
            .or_else(|| address_in(&message.text)),
    }
    .filter(|inviter| !inviter.matches(subject));

    if intro.inviter.is_none() {
        intro.inviter_hint = inviter_text.as_deref().and_then(clean);
    }
    intro
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_test_utils::fixtures::number_for;
    use sigil_test_utils::{bot_identity, msg};

    #[test]
    fn labelled_lines_with_mention() {
        let mut message = msg("name: Dana Scully\ninvited by: \u{FFFC}\nfound us: a friend")
            .from("dana")
            .build();
        message.mentions.push(sigil_core::types::Mention {
            actor: ActorId::new("fox"),
            number: Some(number_for("fox")),
            name: Some("Fox".into()),
            start: 30,
            length: 1,
        });
        let intro = parse_introduction(&message, &bot_identity());
        assert_eq!(intro.name.as_deref(), Some("Dana Scully"));
        assert_eq!(intro.found_via.as_deref(), Some("a friend"));
        let inviter = intro.inviter.unwrap();
        assert_eq!(inviter.id, ActorId::new("fox"));
        assert_eq!(inviter.label(), "Fox");
    }

    #[test]
    fn numbered_answers_with_phone_number() {
        let message = msg("1. Dana\n2) +1 (555) 010-2030\n3. the website").from("dana").build();
        let intro = parse_introduction(&message, &bot_identity());
        assert_eq!(intro.name.as_deref(), Some("Dana"));
        assert_eq!(intro.found_via.as_deref(), Some("the website"));
        let inviter = intro.inviter.unwrap();
        assert_eq!(inviter.number.as_deref(), Some("+15550102030"));
        assert_eq!(inviter.address(), "+15550102030");
    }

    #[test]
    fn unresolved_inviter_is_kept_as_hint() {
        let message = msg("Name: Dana\nInvited by: Fox Mulder").from("dana").build();
        let intro = parse_introduction(&message, &bot_identity());
        assert!(intro.inviter.is_none());
        assert_eq!(intro.inviter_hint.as_deref(), Some("Fox Mulder"));
    }

    #[test]
    fn bot_and_self_are_never_inviters() {
        let message = msg("2. me").from("dana").mentioning_bot().mentioning("dana").build();
        let intro = parse_introduction(&message, &bot_identity());
        assert!(intro.inviter.is_none());
    }

    #[test]
    fn uuid_inviter() {
        let message = msg("invited by 0f8fad5b-d9cb-469f-a165-70867728950e").build();
        let intro = parse_introduction(&message, &bot_identity());
        assert_eq!(
            intro.inviter.map(|i| i.id),
            Some(ActorId::new("0f8fad5b-d9cb-469f-a165-70867728950e"))
        );
    }

    #[test]
    fn number_normalization() {
        assert_eq!(normalize_number("+44 20 7946 0958").as_deref(), Some("+442079460958"));
        assert_eq!(normalize_number("12345"), None);
    }
}
