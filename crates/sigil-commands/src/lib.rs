// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command layer for the Sigil bot runtime.
//!
//! Messages that start with the configured trigger character are parsed
//! into a verb plus arguments and dispatched to the registered
//! [`Command`]. The registry is built once at startup (built-ins first,
//! extensions after) and can be swapped atomically through
//! [`CommandTable::replace`].

pub mod auth;
pub mod builtin;
pub mod command;
pub mod dispatcher;
pub mod registry;
pub mod usage;

pub use auth::AdminPolicy;
pub use builtin::{HelpCommand, PingCommand, StatsCommand};
pub use command::{Command, CommandContext, CommandDescriptor};
pub use dispatcher::{parse_invocation, DispatchOutcome, Dispatcher};
pub use registry::{CommandRegistry, CommandTable, RegistryBuilder};
pub use usage::{UsageLog, VerbStats};
