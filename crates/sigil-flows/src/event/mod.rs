// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Natural-language event creation with follow-up questions.

pub mod assist;
pub mod command;
pub mod draft;
pub mod flow;
pub mod location;
pub mod parser;

pub use command::EventAddCommand;
pub use draft::{EventDefaults, EventDraft, MissingField};
pub use flow::{DraftStage, EventFlow, EventSettings};
