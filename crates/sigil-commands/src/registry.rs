// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command registry built once at startup and swapped atomically.
//!
//! Registration is an ordered merge: built-ins first, then extensions.
//! A later registration for an existing verb replaces the earlier one and
//! the collision is logged.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::command::{Command, CommandDescriptor};

/// Collects commands in registration order.
#[derive(Default)]
pub struct RegistryBuilder {
    commands: Vec<Arc<dyn Command>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn extend<I>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Command>>,
    {
        self.commands.extend(commands);
        self
    }

    /// Produces the immutable verb table. Last registration wins.
    pub fn build(self) -> CommandRegistry {
        let mut commands: HashMap<String, CommandDescriptor> = HashMap::new();
        for command in self.commands {
            let descriptor = CommandDescriptor::from_command(command);
            if descriptor.verb.is_empty() {
                warn!("skipping command with an empty verb");
                continue;
            }
            let verb = descriptor.verb.clone();
            if commands.insert(verb.clone(), descriptor).is_some() {
                warn!(verb = %verb, "command registered twice, last registration wins");
            }
        }
        debug!(count = commands.len(), "command registry built");
        CommandRegistry { commands }
    }
}

/// Immutable verb → descriptor table.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandDescriptor>,
}

impl CommandRegistry {
    pub fn get(&self, verb: &str) -> Option<&CommandDescriptor> {
        self.commands.get(verb)
    }

    /// Descriptors sorted by verb.
    pub fn list(&self) -> Vec<&CommandDescriptor> {
        let mut entries: Vec<&CommandDescriptor> = self.commands.values().collect();
        entries.sort_by(|a, b| a.verb.cmp(&b.verb));
        entries
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Shared handle to the live registry.
///
/// Readers take a snapshot per dispatch; [`replace`](Self::replace) swaps
/// the whole table at once.
#[derive(Clone, Default)]
pub struct CommandTable {
    inner: Arc<ArcSwap<CommandRegistry>>,
}

impl CommandTable {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    pub fn snapshot(&self) -> Arc<CommandRegistry> {
        self.inner.load_full()
    }

    pub fn replace(&self, registry: CommandRegistry) {
        debug!(count = registry.len(), "swapping command table");
        self.inner.store(Arc::new(registry));
    }
}
