// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messenger for deterministic testing.
//!
//! `MockMessenger` implements [`Messenger`] by capturing every outbound
//! message and group update for later assertions.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use sigil_core::types::{GroupInfo, GroupUpdate, HealthStatus, SendReceipt};
use sigil_core::{Messenger, OutboundMessage, PluginAdapter, SigilError};

/// A messenger that records instead of sending.
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    updates: Arc<Mutex<Vec<(String, GroupUpdate)>>>,
    groups: Arc<Mutex<Vec<GroupInfo>>>,
    fail_sends: AtomicBool,
    next_timestamp: AtomicI64,
    notify: Arc<Notify>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            updates: Arc::new(Mutex::new(Vec::new())),
            groups: Arc::new(Mutex::new(Vec::new())),
            fail_sends: AtomicBool::new(false),
            next_timestamp: AtomicI64::new(1_800_000_000_000),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Groups returned by `list_groups()`.
    pub async fn set_groups(&self, groups: Vec<GroupInfo>) {
        *self.groups.lock().await = groups;
    }

    /// Makes every subsequent `send()` fail with `ConnectionLost`.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.text.clone()).collect()
    }

    pub async fn last_text(&self) -> Option<String> {
        self.sent.lock().await.last().map(|m| m.text.clone())
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn group_updates(&self) -> Vec<(String, GroupUpdate)> {
        self.updates.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
        self.updates.lock().await.clear();
    }

    /// Waits until at least `count` messages were sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent.lock().await.len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Waits until at least `count` group updates were issued.
    pub async fn wait_for_updates(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.updates.lock().await.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send(&self, msg: OutboundMessage) -> Result<SendReceipt, SigilError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SigilError::ConnectionLost("mock send failure".into()));
        }
        self.sent.lock().await.push(msg);
        self.notify.notify_waiters();
        Ok(SendReceipt {
            timestamp: Some(self.next_timestamp.fetch_add(1, Ordering::SeqCst)),
        })
    }

    async fn update_group(&self, group_id: &str, update: GroupUpdate) -> Result<(), SigilError> {
        self.updates
            .lock()
            .await
            .push((group_id.to_string(), update));
        self.notify.notify_waiters();
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, SigilError> {
        Ok(self.groups.lock().await.clone())
    }
}

#[async_trait]
impl PluginAdapter for MockMessenger {
    fn name(&self) -> &str {
        "mock-messenger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, SigilError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SigilError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::ConversationId;

    #[tokio::test]
    async fn captures_and_fails_on_demand() {
        let messenger = MockMessenger::new();
        let receipt = messenger
            .send(OutboundMessage::new(ConversationId::Group("g".into()), "hi"))
            .await
            .unwrap();
        assert!(receipt.timestamp.is_some());
        assert_eq!(messenger.sent_texts().await, vec!["hi"]);

        messenger.fail_sends(true);
        assert!(messenger
            .send(OutboundMessage::new(ConversationId::Group("g".into()), "x"))
            .await
            .is_err());
        assert_eq!(messenger.sent_count().await, 1);
    }
}
