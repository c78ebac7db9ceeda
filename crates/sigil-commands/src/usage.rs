// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory usage log: a bounded ring of recent events plus per-verb counters.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use sigil_core::types::UsageEvent;
use sigil_core::UsageRecorder;
use tracing::{info, warn};

/// Success/failure counters for one verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerbStats {
    pub succeeded: u64,
    pub failed: u64,
    pub total_duration: Duration,
}

impl VerbStats {
    pub fn calls(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn mean_duration(&self) -> Duration {
        match self.calls() {
            0 => Duration::ZERO,
            n => self.total_duration / n as u32,
        }
    }
}

pub struct UsageLog {
    capacity: usize,
    recent: Mutex<VecDeque<UsageEvent>>,
    per_verb: DashMap<String, VerbStats>,
}

impl UsageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            per_verb: DashMap::new(),
        }
    }

    /// Most recent events, oldest first.
    pub fn recent(&self) -> Vec<UsageEvent> {
        self.recent
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<UsageEvent> {
        self.recent().into_iter().filter(|e| !e.success).collect()
    }

    pub fn stats_for(&self, verb: &str) -> VerbStats {
        self.per_verb.get(verb).map(|s| *s).unwrap_or_default()
    }

    /// Per-verb counters sorted by call count, busiest first.
    pub fn leaderboard(&self) -> Vec<(String, VerbStats)> {
        let mut rows: Vec<(String, VerbStats)> = self
            .per_verb
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        rows.sort_by(|a, b| b.1.calls().cmp(&a.1.calls()).then_with(|| a.0.cmp(&b.0)));
        rows
    }
}

impl UsageRecorder for UsageLog {
    fn record(&self, event: UsageEvent) {
        if event.success {
            info!(
                command = %event.command,
                actor = %event.actor,
                conversation = %event.conversation,
                duration_ms = event.duration.as_millis() as u64,
                "command completed"
            );
        } else {
            warn!(
                command = %event.command,
                actor = %event.actor,
                conversation = %event.conversation,
                duration_ms = event.duration.as_millis() as u64,
                error = event.error.as_deref().unwrap_or(""),
                "command failed"
            );
        }

        {
            let mut stats = self.per_verb.entry(event.command.clone()).or_default();
            if event.success {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
            stats.total_duration += event.duration;
        }

        if let Ok(mut ring) = self.recent.lock() {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(event);
        }
    }
}
