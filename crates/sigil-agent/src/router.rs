// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides which part of the bot handles an inbound event.
//!
//! Priority for messages: command, onboarding answer, event-draft
//! follow-up, AI thread continuation, bot mention. Reactions only ever
//! feed onboarding. The first handler that claims a message wins.

use std::fmt;
use std::sync::Arc;

use sigil_commands::{DispatchOutcome, Dispatcher};
use sigil_core::{BotIdentity, Inbound, Message, Reaction, SigilError};
use sigil_flows::{AiResponder, EventFlow, OnboardingFlow};
use tracing::{debug, warn};

/// Where an inbound event ended up.
#[derive(Debug)]
pub enum Route {
    Vouch,
    Command(DispatchOutcome),
    Onboarding,
    EventDraft,
    AiContinuation,
    Mention,
    Ignored,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Vouch => write!(f, "vouch"),
            Route::Command(_) => write!(f, "command"),
            Route::Onboarding => write!(f, "onboarding"),
            Route::EventDraft => write!(f, "event_draft"),
            Route::AiContinuation => write!(f, "ai_continuation"),
            Route::Mention => write!(f, "mention"),
            Route::Ignored => write!(f, "ignored"),
        }
    }
}

pub struct Router {
    bot: BotIdentity,
    dispatcher: Dispatcher,
    events: Arc<EventFlow>,
    ai: Arc<AiResponder>,
    onboarding: Option<Arc<OnboardingFlow>>,
}

impl Router {
    pub fn new(
        bot: BotIdentity,
        dispatcher: Dispatcher,
        events: Arc<EventFlow>,
        ai: Arc<AiResponder>,
    ) -> Self {
        Self {
            bot,
            dispatcher,
            events,
            ai,
            onboarding: None,
        }
    }

    pub fn with_onboarding(mut self, flow: Arc<OnboardingFlow>) -> Self {
        self.onboarding = Some(flow);
        self
    }

    pub async fn route(&self, inbound: Inbound) -> Route {
        let route = match &inbound {
            Inbound::Reaction(reaction) => self.route_reaction(reaction).await,
            Inbound::Message(message) => self.route_message(message).await,
        };
        debug!(
            actor = %inbound.actor(),
            conversation = %inbound.conversation(),
            route = %route,
            "inbound routed"
        );
        route
    }

    async fn route_reaction(&self, reaction: &Reaction) -> Route {
        let Some(onboarding) = &self.onboarding else {
            return Route::Ignored;
        };
        match onboarding.handle_reaction(reaction).await {
            Ok(true) => Route::Vouch,
            Ok(false) => Route::Ignored,
            Err(e) => {
                warn!(error = %e, "vouch reaction failed");
                Route::Vouch
            }
        }
    }

    async fn route_message(&self, message: &Message) -> Route {
        if self.is_own(message) {
            return Route::Ignored;
        }

        if self.dispatcher.is_invocation(message) {
            return Route::Command(self.dispatcher.dispatch(message).await);
        }

        if let Some(onboarding) = &self.onboarding
            && claimed(onboarding.handle_message(message).await, "onboarding")
        {
            return Route::Onboarding;
        }

        if claimed(self.events.continue_draft(message).await, "event draft") {
            return Route::EventDraft;
        }

        if claimed(self.ai.continue_thread(message).await, "ai continuation") {
            return Route::AiContinuation;
        }

        if message.mentions_identity(&self.bot)
            && claimed(self.ai.answer_mention(message).await, "mention")
        {
            return Route::Mention;
        }

        Route::Ignored
    }

    fn is_own(&self, message: &Message) -> bool {
        self.bot.is_self(message.sender.id.as_str())
            || message
                .sender
                .number
                .as_deref()
                .is_some_and(|n| self.bot.is_self(n))
    }

    /// Drops expired AI threads and event drafts.
    pub fn purge_expired(&self) -> usize {
        self.ai.tracker().purge_expired() + self.events.purge_expired()
    }
}

/// A handler that failed after claiming the message still owns it.
fn claimed(result: Result<bool, SigilError>, stage: &str) -> bool {
    match result {
        Ok(claimed) => claimed,
        Err(e) => {
            warn!(stage, error = %e, "handler failed");
            true
        }
    }
}
