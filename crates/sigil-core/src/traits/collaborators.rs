// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrow interfaces to the remaining external collaborators.

use async_trait::async_trait;

use crate::error::SigilError;
use crate::types::{ActorId, EventRecord, UsageEvent};

/// Publishes confirmed events (calendar, forum post, file).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Creates the event and returns a short confirmation (link, id).
    async fn create_event(&self, event: &EventRecord) -> Result<String, SigilError>;
}

/// Issues credentials to newly approved members.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issues credentials for `subject` and returns the text to deliver to them.
    async fn issue(&self, subject: &ActorId, display_name: &str) -> Result<String, SigilError>;
}

/// Records command usage for analytics.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, event: UsageEvent);
}
