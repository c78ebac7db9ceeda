// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound side of the messaging daemon.

use async_trait::async_trait;

use crate::error::SigilError;
use crate::types::{GroupInfo, GroupUpdate, Message, OutboundMessage, SendReceipt};

/// Sends messages and manages groups through the messaging daemon.
///
/// The dispatcher, the router and every conversation flow talk to the
/// daemon only through this trait, so tests can substitute a recorder.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a message to a group or a direct peer.
    async fn send(&self, msg: OutboundMessage) -> Result<SendReceipt, SigilError>;

    /// Adds or removes group members.
    async fn update_group(&self, group_id: &str, update: GroupUpdate) -> Result<(), SigilError>;

    /// Lists the groups the bot account belongs to.
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, SigilError>;

    /// Replies to `original` in the conversation it came from.
    async fn send_reply(&self, original: &Message, text: &str) -> Result<SendReceipt, SigilError> {
        self.send(OutboundMessage::reply(original, text)).await
    }
}
