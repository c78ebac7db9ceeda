// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires one bot instance together from configuration and collaborators.

use std::sync::Arc;

use sigil_commands::{
    AdminPolicy, Command, CommandTable, Dispatcher, HelpCommand, PingCommand, RegistryBuilder,
    StatsCommand, UsageLog,
};
use sigil_config::SigilConfig;
use sigil_core::{
    AiProvider, BotIdentity, CredentialIssuer, EventSink, Messenger, SigilError, TextGenerator,
};
use sigil_flows::ai::ai_commands;
use sigil_flows::{
    AiResponder, AiThreadTracker, EventAddCommand, EventFlow, EventSettings, OnboardCommand,
    OnboardingFlow, OnboardingSettings,
};
use tracing::info;

use crate::router::Router;

/// External services the bot talks to.
pub struct Collaborators {
    pub messenger: Arc<dyn Messenger>,
    pub event_sink: Arc<dyn EventSink>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub providers: Vec<Arc<dyn AiProvider>>,
    pub generator: Option<Arc<dyn TextGenerator>>,
}

/// Everything that makes up a running bot. There is no global state:
/// two contexts built from the same config are fully independent.
pub struct BotContext {
    pub bot: BotIdentity,
    pub table: CommandTable,
    pub usage: Arc<UsageLog>,
    pub policy: Arc<AdminPolicy>,
    pub ai: Arc<AiResponder>,
    pub events: Arc<EventFlow>,
    pub onboarding: Option<Arc<OnboardingFlow>>,
    pub router: Arc<Router>,
}

impl BotContext {
    /// Builds the command table (built-ins first, then `extensions`) and
    /// the flows, and connects them through a [`Router`].
    pub fn build(
        config: &SigilConfig,
        bot: BotIdentity,
        collaborators: Collaborators,
        extensions: Vec<Arc<dyn Command>>,
    ) -> Result<Self, SigilError> {
        let Collaborators {
            messenger,
            event_sink,
            issuer,
            providers,
            generator,
        } = collaborators;
        let trigger = config.bot.trigger_char();

        let policy = Arc::new(AdminPolicy::new(
            config.bot.admins.iter().cloned(),
            Arc::clone(&messenger),
        ));
        let usage = Arc::new(UsageLog::new(config.usage.recent_capacity));

        let tracker = Arc::new(AiThreadTracker::new(
            config.ai.continuation_window(),
            config.ai.max_history_turns,
        ));
        let ai = Arc::new(providers.into_iter().fold(
            AiResponder::new(
                tracker,
                Arc::clone(&messenger),
                bot.clone(),
                config.ai.mention_provider,
            ),
            AiResponder::with_provider,
        ));

        let events = Arc::new(EventFlow::new(
            EventSettings::from_config(&config.events)?,
            event_sink,
            Arc::clone(&messenger),
            generator,
        ));

        let onboarding = OnboardingSettings::from_config(&config.onboarding)?.map(|settings| {
            OnboardingFlow::new(
                settings,
                Arc::clone(&messenger),
                issuer,
                Arc::clone(&policy),
                bot.clone(),
            )
        });

        let table = CommandTable::default();
        let mut builder = RegistryBuilder::new()
            .register(Arc::new(HelpCommand::new(
                table.clone(),
                Arc::clone(&policy),
                trigger,
                config.bot.name.clone(),
            )))
            .register(Arc::new(PingCommand))
            .register(Arc::new(StatsCommand::new(
                Arc::clone(&usage),
                Arc::clone(&policy),
            )))
            .extend(ai_commands(&ai))
            .register(Arc::new(EventAddCommand::new(Arc::clone(&events))));
        if let Some(flow) = &onboarding {
            builder = builder.register(Arc::new(OnboardCommand::new(
                Arc::clone(flow),
                Arc::clone(&policy),
            )));
        }
        table.replace(builder.extend(extensions).build());

        let dispatcher = Dispatcher::new(table.clone(), messenger, usage.clone(), trigger);
        let mut router = Router::new(bot.clone(), dispatcher, Arc::clone(&events), Arc::clone(&ai));
        if let Some(flow) = &onboarding {
            router = router.with_onboarding(Arc::clone(flow));
        }

        info!(
            commands = table.snapshot().len(),
            onboarding = onboarding.is_some(),
            "bot context ready"
        );
        Ok(Self {
            bot,
            table,
            usage,
            policy,
            ai,
            events,
            onboarding,
            router: Arc::new(router),
        })
    }
}
