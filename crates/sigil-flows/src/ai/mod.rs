// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI commands and thread continuation.

pub mod command;
pub mod responder;
pub mod thread;

pub use command::{ai_commands, AiCommand};
pub use responder::AiResponder;
pub use thread::{is_continuation_phrase, AiThreadTracker, Continuation, ThreadKey};
