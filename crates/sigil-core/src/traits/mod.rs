// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and collaborator trait definitions.
//!
//! Everything outside the transport-and-dispatch core (AI backends, event
//! storage, credential issuance, usage analytics) is reached through one of
//! these narrow traits. All async traits use `#[async_trait]` so they stay
//! object safe behind `Arc<dyn ...>`.

pub mod adapter;
pub mod ai;
pub mod collaborators;
pub mod messenger;

pub use adapter::PluginAdapter;
pub use ai::{AiProvider, TextGenerator};
pub use collaborators::{CredentialIssuer, EventSink, UsageRecorder};
pub use messenger::Messenger;
