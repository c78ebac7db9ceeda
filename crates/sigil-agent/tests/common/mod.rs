// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for routing tests.
//!
//! `TestBot` assembles a complete bot context with a mock messenger,
//! scripted AI providers and recording collaborators, and exposes
//! `send()` to drive one inbound event through the router.

#![allow(dead_code)]

use std::sync::Arc;

use sigil_agent::{BotContext, Collaborators, Route};
use sigil_commands::Command;
use sigil_config::SigilConfig;
use sigil_core::{AiProvider, Inbound, Message, ProviderTag, Reaction};
use sigil_test_utils::{
    bot_identity, MockAiProvider, MockMessenger, RecordingEventSink, RecordingIssuer,
};

pub const ENTRY_GROUP: &str = "entry-group";

pub struct TestBotBuilder {
    config: SigilConfig,
    claude: bool,
    extensions: Vec<Arc<dyn Command>>,
}

impl TestBotBuilder {
    fn new() -> Self {
        let mut config = SigilConfig::default();
        config.bot.admins = vec!["admin".to_string()];
        Self {
            config,
            claude: false,
            extensions: Vec::new(),
        }
    }

    pub fn with_onboarding(mut self) -> Self {
        self.config.onboarding.enabled = true;
        self.config.onboarding.entry_group_id = Some(ENTRY_GROUP.to_string());
        self
    }

    pub fn with_claude(mut self) -> Self {
        self.claude = true;
        self
    }

    pub fn with_command(mut self, command: Arc<dyn Command>) -> Self {
        self.extensions.push(command);
        self
    }

    pub fn build(self) -> TestBot {
        let messenger = Arc::new(MockMessenger::new());
        let openai = Arc::new(MockAiProvider::new(ProviderTag::OpenAi));
        let claude = Arc::new(MockAiProvider::new(ProviderTag::Claude));
        let sink = Arc::new(RecordingEventSink::new());
        let issuer = Arc::new(RecordingIssuer::new());

        let mut providers: Vec<Arc<dyn AiProvider>> = vec![openai.clone()];
        if self.claude {
            providers.push(claude.clone());
        }
        let context = BotContext::build(
            &self.config,
            bot_identity(),
            Collaborators {
                messenger: messenger.clone(),
                event_sink: sink.clone(),
                issuer: issuer.clone(),
                providers,
                generator: None,
            },
            self.extensions,
        )
        .expect("test bot builds");

        TestBot {
            messenger,
            openai,
            claude,
            sink,
            issuer,
            context,
        }
    }
}

pub struct TestBot {
    pub messenger: Arc<MockMessenger>,
    pub openai: Arc<MockAiProvider>,
    pub claude: Arc<MockAiProvider>,
    pub sink: Arc<RecordingEventSink>,
    pub issuer: Arc<RecordingIssuer>,
    pub context: BotContext,
}

impl TestBot {
    pub fn builder() -> TestBotBuilder {
        TestBotBuilder::new()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn send(&self, message: Message) -> Route {
        self.context.router.route(Inbound::Message(message)).await
    }

    pub async fn react(&self, reaction: Reaction) -> Route {
        self.context.router.route(Inbound::Reaction(reaction)).await
    }
}
