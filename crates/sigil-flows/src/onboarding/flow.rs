// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newcomer screening: `awaiting_intro -> awaiting_vouch -> approved`.
//!
//! Every subject has one timeout task. Each transition bumps the subject's
//! generation and re-arms the timer; a timer only acts if the generation
//! it was armed with is still current, so a stale timer can never remove
//! someone who has moved on. Approval, decline, cancellation and expiry
//! all clear the subject's state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use sigil_commands::AdminPolicy;
use sigil_config::model::OnboardingConfig;
use sigil_core::types::{GroupUpdate, Sender};
use sigil_core::{
    ActorId, BotIdentity, ConversationId, CredentialIssuer, Message, Messenger, OutboundMessage,
    Reaction, SigilError,
};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::intro::{parse_introduction, InviterRef};

#[derive(Debug, Clone)]
pub struct OnboardingSettings {
    pub entry_group_id: String,
    pub timeout: Duration,
    pub require_admin: bool,
}

impl OnboardingSettings {
    /// `None` when onboarding is disabled.
    pub fn from_config(config: &OnboardingConfig) -> Result<Option<Self>, SigilError> {
        if !config.enabled {
            return Ok(None);
        }
        let entry_group_id = config
            .entry_group_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                SigilError::Config("onboarding.entry_group_id is required when enabled".into())
            })?;
        Ok(Some(Self {
            entry_group_id,
            timeout: config.intro_timeout(),
            require_admin: config.require_admin,
        }))
    }

    /// The conversation newcomers are screened in.
    pub fn entry(&self) -> ConversationId {
        ConversationId::Group(self.entry_group_id.clone())
    }
}

/// The person being onboarded, as named by `!onboard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRef {
    pub id: ActorId,
    pub number: Option<String>,
    pub name: String,
}

impl SubjectRef {
    fn address(&self) -> &str {
        self.number.as_deref().unwrap_or(self.id.as_str())
    }

    fn matches(&self, sender: &Sender) -> bool {
        sender.matches(self.id.as_str())
            || self.number.as_deref().is_some_and(|n| sender.matches(n))
    }

    fn matches_ref(&self, other: &SubjectRef) -> bool {
        self.id == other.id
            || other.number.as_deref().is_some_and(|n| {
                self.number.as_deref() == Some(n) || self.id.as_str() == n
            })
            || self.number.as_deref() == Some(other.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingStage {
    AwaitingIntro,
    AwaitingVouch { inviter: InviterRef },
}

impl fmt::Display for OnboardingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnboardingStage::AwaitingIntro => write!(f, "awaiting_intro"),
            OnboardingStage::AwaitingVouch { .. } => write!(f, "awaiting_vouch"),
        }
    }
}

/// A row of `!onboard status`.
#[derive(Debug, Clone)]
pub struct SubjectStatus {
    pub subject: SubjectRef,
    pub stage: OnboardingStage,
    pub waiting: Duration,
}

#[derive(Debug)]
struct Pending {
    subject: SubjectRef,
    stage: OnboardingStage,
    /// Timestamp of the bot message the next answer should quote.
    prompt_timestamp: Option<i64>,
    generation: u64,
    since: Instant,
    timer: Option<AbortHandle>,
}

impl Pending {
    fn quoted_by(&self, message: &Message, bot: &BotIdentity) -> bool {
        match (&message.reply_to, self.prompt_timestamp) {
            (Some(quote), Some(ts)) if quote.timestamp == ts => true,
            _ => message.quotes_identity(bot),
        }
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

enum VouchAnswer {
    Yes,
    No,
}

fn vouch_answer(text: &str) -> Option<VouchAnswer> {
    let answer = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase();
    match answer.as_str() {
        "yes" | "y" | "vouch" | "i vouch" | "i vouch for them" | "👍" => Some(VouchAnswer::Yes),
        "no" | "n" | "i don't vouch" | "i do not vouch" | "👎" => Some(VouchAnswer::No),
        _ => None,
    }
}

pub struct OnboardingFlow {
    me: Weak<OnboardingFlow>,
    pending: DashMap<ActorId, Pending>,
    generations: AtomicU64,
    settings: OnboardingSettings,
    messenger: Arc<dyn Messenger>,
    issuer: Arc<dyn CredentialIssuer>,
    policy: Arc<AdminPolicy>,
    bot: BotIdentity,
}

impl OnboardingFlow {
    pub fn new(
        settings: OnboardingSettings,
        messenger: Arc<dyn Messenger>,
        issuer: Arc<dyn CredentialIssuer>,
        policy: Arc<AdminPolicy>,
        bot: BotIdentity,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            pending: DashMap::new(),
            generations: AtomicU64::new(0),
            settings,
            messenger,
            issuer,
            policy,
            bot,
        })
    }

    pub fn settings(&self) -> &OnboardingSettings {
        &self.settings
    }

    pub fn bot(&self) -> &BotIdentity {
        &self.bot
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn find(&self, predicate: impl Fn(&Pending) -> bool) -> Option<ActorId> {
        self.pending
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.key().clone())
    }

    /// Starts screening `subject` and posts the intro prompt to the entry group.
    pub async fn begin(&self, subject: SubjectRef) -> Result<String, SigilError> {
        let generation = self.next_generation();
        let key = subject.id.clone();

        if let Some(existing) = self.find(|p| p.subject.matches_ref(&subject)) {
            if let Some((_, mut old)) = self.pending.remove(&existing) {
                old.disarm();
                debug!(subject = %existing, "restarting onboarding");
            }
        }
        self.pending.insert(
            key.clone(),
            Pending {
                subject: subject.clone(),
                stage: OnboardingStage::AwaitingIntro,
                prompt_timestamp: None,
                generation,
                since: Instant::now(),
                timer: None,
            },
        );
        self.arm(&key, generation);

        let hours = self.settings.timeout.as_secs() / 3600;
        let prompt = format!(
            "Welcome {}! Before you join, please reply to this message with:\n\
             1. Your name\n\
             2. Who invited you (mention them or send their number)\n\
             3. How you found the group\n\
             You have {hours} hours to answer.",
            subject.name
        );
        let receipt = self
            .messenger
            .send(OutboundMessage::new(self.settings.entry(), prompt))
            .await?;
        self.set_prompt(&key, generation, receipt.timestamp);

        info!(subject = %key, generation, "onboarding started");
        Ok(format!(
            "Onboarding started for {}. They have {hours} hours to introduce themselves.",
            subject.name
        ))
    }

    /// Handles an answer from a subject or an inviter.
    ///
    /// Returns `Ok(false)` when the message is not part of any onboarding.
    pub async fn handle_message(&self, message: &Message) -> Result<bool, SigilError> {
        let sender = &message.sender;

        let subject_key = self.find(|p| {
            p.stage == OnboardingStage::AwaitingIntro
                && p.subject.matches(sender)
                && (p.quoted_by(message, &self.bot) || !message.is_group())
        });
        if let Some(key) = subject_key {
            return self.receive_intro(&key, message).await.map(|()| true);
        }

        let Some(answer) = vouch_answer(&message.plain_text()) else {
            return Ok(false);
        };
        let quoted_ts = message.reply_to.as_ref().map(|q| q.timestamp);
        let is_inviter = |p: &Pending| {
            matches!(&p.stage, OnboardingStage::AwaitingVouch { inviter } if inviter.matches(sender))
        };
        let vouch_key = self
            .find(|p| is_inviter(p) && quoted_ts.is_some() && p.prompt_timestamp == quoted_ts)
            .or_else(|| {
                if message.quotes_identity(&self.bot) {
                    self.find(is_inviter)
                } else {
                    None
                }
            });
        let Some(key) = vouch_key else {
            return Ok(false);
        };
        let Some(generation) = self.pending.get(&key).map(|p| p.generation) else {
            return Ok(false);
        };

        match answer {
            VouchAnswer::Yes => self.approve(&key, generation).await?,
            VouchAnswer::No => self.decline(&key, generation).await?,
        }
        Ok(true)
    }

    /// A thumbs-up from a pending inviter on a bot message approves.
    pub async fn handle_reaction(&self, reaction: &Reaction) -> Result<bool, SigilError> {
        if reaction.is_remove || !reaction.emoji.starts_with('👍') {
            return Ok(false);
        }
        let actor_number = reaction.actor_number.as_deref();
        let key = self.find(|p| match &p.stage {
            OnboardingStage::AwaitingVouch { inviter } => {
                inviter.matches_parts(&reaction.actor, actor_number)
                    && (p.prompt_timestamp == Some(reaction.target_timestamp)
                        || reaction.targets_identity(&self.bot))
            }
            OnboardingStage::AwaitingIntro => false,
        });
        let Some(key) = key else {
            return Ok(false);
        };
        let Some(generation) = self.pending.get(&key).map(|p| p.generation) else {
            return Ok(false);
        };
        self.approve(&key, generation).await?;
        Ok(true)
    }

    async fn receive_intro(&self, key: &ActorId, message: &Message) -> Result<(), SigilError> {
        let intro = parse_introduction(message, &self.bot);
        let Some(inviter) = intro.inviter.clone() else {
            let ask = match &intro.inviter_hint {
                Some(hint) => format!(
                    "Thanks! I couldn't find an account for {hint}. Please mention the person who invited you, or send their number."
                ),
                None => "Thanks! Who invited you? Please mention them or send their number."
                    .to_string(),
            };
            self.messenger.send_reply(message, &ask).await?;
            return Ok(());
        };

        let generation = self.next_generation();
        let name = {
            let Some(mut pending) = self.pending.get_mut(key) else {
                return Ok(());
            };
            if pending.stage != OnboardingStage::AwaitingIntro {
                return Ok(());
            }
            pending.disarm();
            if let Some(name) = intro.name.clone() {
                pending.subject.name = name;
            }
            pending.stage = OnboardingStage::AwaitingVouch {
                inviter: inviter.clone(),
            };
            pending.generation = generation;
            pending.prompt_timestamp = None;
            pending.since = Instant::now();
            pending.subject.name.clone()
        };
        self.arm(key, generation);
        info!(subject = %key, inviter = %inviter.id, generation, "introduction received");

        let request = format!(
            "{}: {name} says you invited them. Do you vouch for them? Reply to this message with yes or no.",
            inviter.label()
        );
        let receipt = self
            .messenger
            .send(OutboundMessage::new(self.settings.entry(), request))
            .await?;
        self.set_prompt(key, generation, receipt.timestamp);
        Ok(())
    }

    async fn approve(&self, key: &ActorId, generation: u64) -> Result<(), SigilError> {
        let Some((_, mut pending)) = self.pending.remove_if(key, |_, p| {
            p.generation == generation && matches!(p.stage, OnboardingStage::AwaitingVouch { .. })
        }) else {
            return Ok(());
        };
        pending.disarm();
        let OnboardingStage::AwaitingVouch { inviter } = pending.stage.clone() else {
            return Ok(());
        };
        let subject = pending.subject.clone();

        let credential = match self.issuer.issue(&subject.id, &subject.name).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(subject = %key, error = %e, "credential issuance failed");
                let retry = self.next_generation();
                pending.generation = retry;
                pending.since = Instant::now();
                self.pending.entry(key.clone()).or_insert(pending);
                self.arm(key, retry);
                self.messenger
                    .send(OutboundMessage::new(
                        self.settings.entry(),
                        format!(
                            "⚠️ Could not issue credentials for {}: {}. The inviter can vouch again to retry.",
                            subject.name,
                            e.user_message()
                        ),
                    ))
                    .await?;
                return Ok(());
            }
        };
        info!(subject = %key, inviter = %inviter.id, "subject approved");

        self.messenger
            .send(OutboundMessage::new(
                ConversationId::Direct(ActorId::new(subject.address())),
                format!("Welcome, {}! {credential}", subject.name),
            ))
            .await?;
        self.messenger
            .send(OutboundMessage::new(
                self.settings.entry(),
                format!(
                    "✅ {} was vouched for by {} and is approved.",
                    subject.name,
                    inviter.label()
                ),
            ))
            .await?;

        let mut leaving = vec![subject.address().to_string()];
        let inviter_is_admin = self
            .policy
            .is_admin(&inviter.id, inviter.number.as_deref(), &self.settings.entry())
            .await;
        if !inviter_is_admin {
            leaving.push(inviter.address().to_string());
        }
        self.messenger
            .update_group(&self.settings.entry_group_id, GroupUpdate::remove(leaving))
            .await?;
        Ok(())
    }

    async fn decline(&self, key: &ActorId, generation: u64) -> Result<(), SigilError> {
        let Some((_, mut pending)) = self
            .pending
            .remove_if(key, |_, p| p.generation == generation)
        else {
            return Ok(());
        };
        pending.disarm();
        info!(subject = %key, "vouch declined");
        self.remove_subject(
            &pending.subject,
            &format!("{} was not vouched for and has been removed.", pending.subject.name),
        )
        .await
    }

    /// Timer callback. Acts only if `generation` is still current.
    async fn expire(&self, key: &ActorId, generation: u64) -> Result<(), SigilError> {
        let Some((_, pending)) = self
            .pending
            .remove_if(key, |_, p| p.generation == generation)
        else {
            debug!(subject = %key, generation, "stale onboarding timer ignored");
            return Ok(());
        };
        info!(subject = %key, stage = %pending.stage, "onboarding timed out");
        self.remove_subject(
            &pending.subject,
            &format!(
                "{} did not complete onboarding in time and has been removed.",
                pending.subject.name
            ),
        )
        .await
    }

    async fn remove_subject(&self, subject: &SubjectRef, notice: &str) -> Result<(), SigilError> {
        self.messenger
            .update_group(
                &self.settings.entry_group_id,
                GroupUpdate::remove([subject.address().to_string()]),
            )
            .await?;
        self.messenger
            .send(OutboundMessage::new(self.settings.entry(), notice))
            .await?;
        Ok(())
    }

    fn arm(&self, key: &ActorId, generation: u64) {
        let me = self.me.clone();
        let timeout = self.settings.timeout;
        let subject = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(flow) = me.upgrade() {
                if let Err(e) = flow.expire(&subject, generation).await {
                    warn!(subject = %subject, error = %e, "onboarding expiry failed");
                }
            }
        });
        let handle = task.abort_handle();
        match self.pending.get_mut(key) {
            Some(mut pending) if pending.generation == generation => {
                pending.disarm();
                pending.timer = Some(handle);
            }
            _ => handle.abort(),
        }
    }

    fn set_prompt(&self, key: &ActorId, generation: u64, timestamp: Option<i64>) {
        if let Some(mut pending) = self.pending.get_mut(key) {
            if pending.generation == generation {
                pending.prompt_timestamp = timestamp;
            }
        }
    }

    /// Drops a subject's state without touching the group.
    pub fn cancel(&self, subject: &SubjectRef) -> bool {
        let Some(key) = self.find(|p| p.subject.matches_ref(subject)) else {
            return false;
        };
        match self.pending.remove(&key) {
            Some((_, mut pending)) => {
                pending.disarm();
                info!(subject = %key, "onboarding cancelled");
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> Vec<SubjectStatus> {
        let mut rows: Vec<SubjectStatus> = self
            .pending
            .iter()
            .map(|entry| SubjectStatus {
                subject: entry.subject.clone(),
                stage: entry.stage.clone(),
                waiting: entry.since.elapsed(),
            })
            .collect();
        rows.sort_by(|a, b| b.waiting.cmp(&a.waiting));
        rows
    }

    pub fn stage_of(&self, subject: &ActorId) -> Option<OnboardingStage> {
        self.pending.get(subject).map(|p| p.stage.clone())
    }

    pub fn is_pending(&self, subject: &ActorId) -> bool {
        self.pending.contains_key(subject)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for OnboardingFlow {
    fn drop(&mut self) {
        for mut entry in self.pending.iter_mut() {
            entry.disarm();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vouch_answers() {
        assert!(matches!(vouch_answer("Yes!"), Some(VouchAnswer::Yes)));
        assert!(matches!(vouch_answer("I vouch"), Some(VouchAnswer::Yes)));
        assert!(matches!(vouch_answer("no."), Some(VouchAnswer::No)));
        assert!(vouch_answer("maybe later").is_none());
    }

    #[test]
    fn disabled_config_yields_no_settings() {
        assert!(OnboardingSettings::from_config(&OnboardingConfig::default())
            .unwrap()
            .is_none());
        let enabled = OnboardingConfig {
            enabled: true,
            entry_group_id: Some("g".into()),
            ..Default::default()
        };
        let settings = OnboardingSettings::from_config(&enabled).unwrap().unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(72 * 3600));
    }

    #[test]
    fn subject_refs_match_by_id_or_number() {
        let by_number = SubjectRef {
            id: ActorId::new("+15550001"),
            number: Some("+15550001".into()),
            name: "x".into(),
        };
        let by_uuid = SubjectRef {
            id: ActorId::new("uuid-1"),
            number: Some("+15550001".into()),
            name: "x".into(),
        };
        assert!(by_number.matches_ref(&by_uuid));
        assert!(by_uuid.matches_ref(&by_number));
    }
}
