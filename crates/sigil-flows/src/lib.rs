// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-message conversation flows for the Sigil bot runtime.
//!
//! Each flow keeps its per-actor state in a concurrent map. All state is
//! in memory, expires on its own, and is gone after a restart:
//!
//! - [`ai`]: AI commands and thread continuation within a time window.
//! - [`event`]: event drafts completed through follow-up questions.
//! - [`onboarding`]: newcomer introductions, vouching and timeouts.

pub mod ai;
pub mod event;
pub mod onboarding;

pub use ai::{ai_commands, AiCommand, AiResponder, AiThreadTracker};
pub use event::{EventAddCommand, EventFlow, EventSettings};
pub use onboarding::{OnboardCommand, OnboardingFlow, OnboardingSettings};
