// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newcomer onboarding and vouching.

pub mod command;
pub mod flow;
pub mod intro;

pub use command::OnboardCommand;
pub use flow::{OnboardingFlow, OnboardingSettings, OnboardingStage, SubjectRef, SubjectStatus};
pub use intro::{parse_introduction, InviterRef, Introduction};
