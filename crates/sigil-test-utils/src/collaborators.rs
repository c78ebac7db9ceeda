// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording event sink, credential issuer and usage recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sigil_core::types::{EventRecord, UsageEvent};
use sigil_core::{ActorId, CredentialIssuer, EventSink, SigilError, UsageRecorder};

/// Captures created events.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<EventRecord>>>,
    fail: AtomicBool,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<EventRecord> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn create_event(&self, event: &EventRecord) -> Result<String, SigilError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SigilError::Internal("event sink unavailable".into()));
        }
        let mut events = self.events.lock().await;
        events.push(event.clone());
        Ok(format!("event #{}", events.len()))
    }
}

/// Issues predictable credentials and records who received them.
#[derive(Default)]
pub struct RecordingIssuer {
    issued: Arc<Mutex<Vec<(ActorId, String)>>>,
}

impl RecordingIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issued(&self) -> Vec<(ActorId, String)> {
        self.issued.lock().await.clone()
    }
}

#[async_trait]
impl CredentialIssuer for RecordingIssuer {
    async fn issue(&self, subject: &ActorId, display_name: &str) -> Result<String, SigilError> {
        self.issued
            .lock()
            .await
            .push((subject.clone(), display_name.to_string()));
        Ok(format!("credential-for-{subject}"))
    }
}

/// Keeps every usage event in memory.
#[derive(Default)]
pub struct RecordingUsage {
    events: StdMutex<Vec<UsageEvent>>,
}

impl RecordingUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UsageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<UsageEvent> {
        self.events().into_iter().filter(|e| !e.success).collect()
    }
}

impl UsageRecorder for RecordingUsage {
    fn record(&self, event: UsageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
