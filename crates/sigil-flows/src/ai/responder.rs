// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes prompts to AI providers by tag and keeps threads up to date.

use std::collections::HashMap;
use std::sync::Arc;

use sigil_core::types::AiRequest;
use sigil_core::{AiProvider, BotIdentity, Message, Messenger, ProviderTag, SigilError};
use tracing::{debug, info, warn};

use super::thread::{AiThreadTracker, Continuation, ThreadKey};

pub struct AiResponder {
    providers: HashMap<ProviderTag, Arc<dyn AiProvider>>,
    tracker: Arc<AiThreadTracker>,
    messenger: Arc<dyn Messenger>,
    bot: BotIdentity,
    mention_provider: ProviderTag,
}

impl AiResponder {
    pub fn new(
        tracker: Arc<AiThreadTracker>,
        messenger: Arc<dyn Messenger>,
        bot: BotIdentity,
        mention_provider: ProviderTag,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            tracker,
            messenger,
            bot,
            mention_provider,
        }
    }

    /// Registers a provider under its own tag, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.providers.insert(provider.tag(), provider);
        self
    }

    pub fn has_provider(&self, tag: ProviderTag) -> bool {
        self.providers.contains_key(&tag)
    }

    pub fn tracker(&self) -> &Arc<AiThreadTracker> {
        &self.tracker
    }

    /// Answers an explicit request and (re)opens the sender's thread.
    ///
    /// The thread opens only once the provider has answered. A failed
    /// request leaves no thread behind, so the sender's next message is not
    /// sent to a provider that just failed and is handled by the normal
    /// routing instead. A thread left by an earlier answer stays untouched.
    pub async fn ask(
        &self,
        message: &Message,
        tag: ProviderTag,
        prompt: &str,
    ) -> Result<String, SigilError> {
        let key = ThreadKey::for_message(message);
        let answer = self.complete(tag, message, prompt, Vec::new()).await?;
        self.tracker.open(key.clone(), tag);
        self.tracker.record_exchange(&key, prompt, &answer);
        Ok(answer)
    }

    /// Answers `message` if it continues a live thread.
    ///
    /// Returns `Ok(false)` when the message is not a continuation.
    pub async fn continue_thread(&self, message: &Message) -> Result<bool, SigilError> {
        let Some(Continuation { provider, history }) = self.tracker.claim(message, &self.bot)
        else {
            return Ok(false);
        };
        info!(
            conversation = %message.conversation,
            actor = %message.sender.id,
            %provider,
            "continuing ai thread"
        );

        let prompt = message.plain_text();
        let key = ThreadKey::for_message(message);
        match self.complete(provider, message, &prompt, history).await {
            Ok(answer) => {
                self.tracker.record_exchange(&key, &prompt, &answer);
                self.messenger.send_reply(message, &answer).await?;
            }
            Err(e) => self.report_failure(message, provider, &e).await?,
        }
        Ok(true)
    }

    /// Answers a message that @-mentions the bot and opens a thread.
    ///
    /// Returns `Ok(false)` when no provider is configured for mentions.
    pub async fn answer_mention(&self, message: &Message) -> Result<bool, SigilError> {
        let tag = self.mention_provider;
        if !self.has_provider(tag) {
            debug!(provider = %tag, "mention ignored, provider not configured");
            return Ok(false);
        }

        let prompt = message.plain_text();
        if prompt.is_empty() {
            self.messenger
                .send_reply(message, "Ask me something after the mention.")
                .await?;
            return Ok(true);
        }

        match self.ask(message, tag, &prompt).await {
            Ok(answer) => {
                self.messenger.send_reply(message, &answer).await?;
            }
            Err(e) => self.report_failure(message, tag, &e).await?,
        }
        Ok(true)
    }

    async fn complete(
        &self,
        tag: ProviderTag,
        message: &Message,
        prompt: &str,
        history: Vec<sigil_core::types::AiTurn>,
    ) -> Result<String, SigilError> {
        let provider = self.providers.get(&tag).ok_or_else(|| SigilError::Provider {
            message: format!("{tag} is not configured"),
            source: None,
        })?;
        let request = AiRequest {
            prompt: prompt.to_string(),
            history,
            quoted: message.reply_to.as_ref().and_then(|q| q.text.clone()),
            requester: Some(message.sender.label().to_string()),
        };
        let answer = provider.complete(request).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SigilError::Provider {
                message: format!("{tag} returned an empty answer"),
                source: None,
            });
        }
        Ok(answer.to_string())
    }

    async fn report_failure(
        &self,
        message: &Message,
        tag: ProviderTag,
        error: &SigilError,
    ) -> Result<(), SigilError> {
        warn!(provider = %tag, error = %error, "ai request failed");
        self.messenger
            .send_reply(
                message,
                &format!("⚠️ {tag} request failed: {}", error.user_message()),
            )
            .await?;
        Ok(())
    }
}
