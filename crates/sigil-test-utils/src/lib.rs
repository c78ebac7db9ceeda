// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sigil integration tests.
//!
//! Provides mock collaborators and message fixtures for fast,
//! deterministic tests without a running daemon or AI backend.
//!
//! # Components
//!
//! - [`MockMessenger`] - captures outbound messages and group updates
//! - [`MockAiProvider`] / [`MockTextGenerator`] - scripted AI replies
//! - [`RecordingEventSink`], [`RecordingIssuer`], [`RecordingUsage`] - recording collaborators
//! - [`fixtures`] - message and reaction builders

pub mod collaborators;
pub mod fixtures;
pub mod mock_ai;
pub mod mock_messenger;

pub use collaborators::{RecordingEventSink, RecordingIssuer, RecordingUsage};
pub use fixtures::{bot_identity, msg, reaction_to_bot, MessageBuilder};
pub use mock_ai::{MockAiProvider, MockTextGenerator};
pub use mock_messenger::MockMessenger;
