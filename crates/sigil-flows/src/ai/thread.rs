// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(conversation, actor) AI threads.
//!
//! A thread opens when an explicit AI command (or a bot mention) gets an
//! answer. A later non-command message from the same actor in the same
//! conversation continues it only if the thread is younger than the
//! continuation window and the message is a reply to the bot or one of
//! the fixed continuation phrases. Stale threads are evicted lazily.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sigil_core::types::{AiTurn, TurnRole};
use sigil_core::{ActorId, BotIdentity, ConversationId, Message, ProviderTag};
use tokio::time::Instant;
use tracing::debug;

/// Follow-ups accepted without quoting the bot. Exact match only.
pub const CONTINUATION_PHRASES: &[&str] = &[
    "continue",
    "go on",
    "keep going",
    "more",
    "tell me more",
    "elaborate",
    "expand",
    "explain more",
    "say more",
    "and then",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub conversation: ConversationId,
    pub actor: ActorId,
}

impl ThreadKey {
    pub fn new(conversation: ConversationId, actor: ActorId) -> Self {
        Self {
            conversation,
            actor,
        }
    }

    pub fn for_message(message: &Message) -> Self {
        Self::new(message.conversation.clone(), message.sender.id.clone())
    }
}

#[derive(Debug, Clone)]
struct ThreadState {
    provider: ProviderTag,
    last_activity: Instant,
    history: VecDeque<AiTurn>,
}

/// What a claimed continuation hands to the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub provider: ProviderTag,
    pub history: Vec<AiTurn>,
}

/// Whether `text` is exactly one of [`CONTINUATION_PHRASES`].
///
/// Case and trailing punctuation are ignored.
pub fn is_continuation_phrase(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c == '…')
        .trim()
        .to_lowercase();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    CONTINUATION_PHRASES.contains(&normalized.as_str())
}

pub struct AiThreadTracker {
    threads: DashMap<ThreadKey, ThreadState>,
    window: Duration,
    max_turns: usize,
}

impl AiThreadTracker {
    pub fn new(window: Duration, max_turns: usize) -> Self {
        Self {
            threads: DashMap::new(),
            window,
            max_turns,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts (or restarts) a thread with an empty history.
    pub fn open(&self, key: ThreadKey, provider: ProviderTag) {
        debug!(conversation = %key.conversation, actor = %key.actor, %provider, "ai thread opened");
        self.threads.insert(
            key,
            ThreadState {
                provider,
                last_activity: Instant::now(),
                history: VecDeque::new(),
            },
        );
    }

    /// Appends one prompt/answer pair and refreshes the thread.
    ///
    /// Does nothing if the thread was closed in the meantime.
    pub fn record_exchange(&self, key: &ThreadKey, prompt: &str, answer: &str) {
        if let Some(mut state) = self.threads.get_mut(key) {
            state.history.push_back(AiTurn {
                role: TurnRole::User,
                content: prompt.to_string(),
            });
            state.history.push_back(AiTurn {
                role: TurnRole::Assistant,
                content: answer.to_string(),
            });
            while state.history.len() > self.max_turns {
                state.history.pop_front();
            }
            state.last_activity = Instant::now();
        }
    }

    /// Claims `message` as a continuation of its sender's thread.
    ///
    /// The expiry check, eviction and refresh happen under the entry lock,
    /// so a stale thread can never be refreshed back to life.
    pub fn claim(&self, message: &Message, bot: &BotIdentity) -> Option<Continuation> {
        let qualifies =
            message.quotes_identity(bot) || is_continuation_phrase(&message.plain_text());
        let key = ThreadKey::for_message(message);

        match self.threads.entry(key) {
            Entry::Occupied(mut entry) => {
                let now = Instant::now();
                if now.duration_since(entry.get().last_activity) >= self.window {
                    let (key, _) = entry.remove_entry();
                    debug!(conversation = %key.conversation, actor = %key.actor, "ai thread expired");
                    return None;
                }
                if !qualifies {
                    return None;
                }
                let state = entry.get_mut();
                state.last_activity = now;
                Some(Continuation {
                    provider: state.provider,
                    history: state.history.iter().cloned().collect(),
                })
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Provider of a live thread, without refreshing it.
    pub fn provider_for(&self, key: &ThreadKey) -> Option<ProviderTag> {
        let state = self.threads.get(key)?;
        (state.last_activity.elapsed() < self.window).then_some(state.provider)
    }

    pub fn close(&self, key: &ThreadKey) -> bool {
        self.threads.remove(key).is_some()
    }

    /// Drops every thread older than the window.
    pub fn purge_expired(&self) -> usize {
        let before = self.threads.len();
        let window = self.window;
        self.threads
            .retain(|_, state| state.last_activity.elapsed() < window);
        before - self.threads.len()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
