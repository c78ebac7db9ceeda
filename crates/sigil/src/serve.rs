// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sigil serve` command implementation.
//!
//! Starts the signal-cli transport, assembles the bot from configuration
//! and runs it until a shutdown signal or a fatal transport failure.

use std::sync::Arc;

use sigil_agent::{BotContext, BotRuntime, Collaborators, install_signal_handler};
use sigil_config::model::AiConfig;
use sigil_config::SigilConfig;
use sigil_core::types::HealthStatus;
use sigil_core::{AiProvider, PluginAdapter, ProviderTag, SigilError, TextGenerator};
use sigil_openai::ChatProvider;
use sigil_signal::{SignalChannel, SignalSettings, TransportStatus};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collaborators::{JsonlEventSink, LinkIssuer};

/// Runs the `sigil serve` command.
pub async fn run_serve(config: SigilConfig) -> Result<(), SigilError> {
    init_tracing(&config.bot.log_level);
    info!(name = %config.bot.name, "starting sigil serve");

    let settings = SignalSettings::from_config(&config)?;
    let bot = settings.bot.clone();
    let providers = initialize_providers(&config.ai).await?;

    let (channel, inbound) = SignalChannel::start(settings).await?;

    let generator = providers
        .first()
        .map(|p| Arc::clone(p) as Arc<dyn TextGenerator>);
    let event_sink = Arc::new(JsonlEventSink::new(config.event_sink_path()));
    info!(path = %event_sink.path().display(), "event sink ready");
    let collaborators = Collaborators {
        messenger: channel.client(),
        event_sink,
        issuer: Arc::new(LinkIssuer::new(config.onboarding.welcome_link.clone())),
        providers: providers
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn AiProvider>)
            .collect(),
        generator,
    };
    let context = match BotContext::build(&config, bot, collaborators, Vec::new()) {
        Ok(context) => context,
        Err(e) => {
            channel.shutdown().await;
            return Err(e);
        }
    };

    let cancel = install_signal_handler();
    let watcher = tokio::spawn(watch_transport(channel.status(), cancel.clone()));

    let runtime = BotRuntime::new(Arc::clone(&context.router));
    runtime.run(inbound, cancel.clone()).await;

    // The runtime may also stop because the inbound stream closed.
    cancel.cancel();
    let failure = match watcher.await {
        Ok(failure) => failure,
        Err(e) => {
            warn!(error = %e, "transport watcher ended abnormally");
            None
        }
    };

    for provider in &providers {
        if let Err(e) = provider.shutdown().await {
            warn!(provider = provider.name(), error = %e, "provider shutdown failed");
        }
    }
    channel.shutdown().await;

    match failure {
        Some(reason) => {
            error!(reason = %reason, "sigil serve stopped after a transport failure");
            Err(SigilError::Daemon {
                message: reason,
                source: None,
            })
        }
        None => {
            info!("sigil serve shutdown complete");
            Ok(())
        }
    }
}

/// Builds every provider that has an API key and checks it once.
async fn initialize_providers(ai: &AiConfig) -> Result<Vec<Arc<ChatProvider>>, SigilError> {
    let mut providers = Vec::new();
    for tag in [ProviderTag::OpenAi, ProviderTag::Claude] {
        let Some(provider) = ChatProvider::from_config(ai, tag)? else {
            continue;
        };
        match provider.health_check().await? {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                warn!(provider = provider.name(), reason = %reason, "provider degraded")
            }
            HealthStatus::Unhealthy(reason) => {
                warn!(provider = provider.name(), reason = %reason, "provider unhealthy, skipping");
                continue;
            }
        }
        providers.push(Arc::new(provider));
    }
    if providers.is_empty() {
        info!("no AI provider configured, AI commands will report that they are unavailable");
    }
    Ok(providers)
}

/// Cancels `cancel` once the transport reaches a terminal state.
///
/// Returns the failure reason when the transport gave up.
async fn watch_transport(
    mut status: watch::Receiver<TransportStatus>,
    cancel: CancellationToken,
) -> Option<String> {
    loop {
        let current = status.borrow_and_update().clone();
        match current {
            TransportStatus::Failed(reason) => {
                cancel.cancel();
                return Some(reason);
            }
            TransportStatus::Stopped => {
                cancel.cancel();
                return None;
            }
            other => info!(status = %other, "transport status"),
        }
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
            _ = cancel.cancelled() => return None,
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sigil={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn watcher_reports_failure_and_cancels() {
        let (tx, rx) = watch::channel(TransportStatus::Starting);
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_transport(rx, cancel.clone()));

        tx.send(TransportStatus::Connected).unwrap();
        tx.send(TransportStatus::Failed("daemon restart limit reached".into()))
            .unwrap();

        let failure = tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failure.as_deref(), Some("daemon restart limit reached"));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn watcher_returns_quietly_on_shutdown_signal() {
        let (_tx, rx) = watch::channel(TransportStatus::Connected);
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_transport(rx, cancel.clone()));

        cancel.cancel();
        let failure = tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .unwrap()
            .unwrap();
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn no_providers_without_api_keys() {
        let providers = initialize_providers(&AiConfig::default()).await.unwrap();
        assert!(providers.is_empty());
    }

    #[tokio::test]
    async fn providers_built_for_configured_keys() {
        let mut ai = AiConfig::default();
        ai.claude.api_key = Some("sk-ant-test".into());
        let providers = initialize_providers(&ai).await.unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].tag(), ProviderTag::Claude);
    }
}
