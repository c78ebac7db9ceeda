// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime loop for the Sigil bot.
//!
//! The [`BotRuntime`] is the sole consumer of the transport's inbound
//! channel. It:
//! - Hands each event to a per-conversation worker that calls the
//!   [`Router`] one event at a time, in arrival order
//! - Keeps conversations independent, so a slow AI answer in one group
//!   never delays another
//! - Periodically drops expired AI threads, event drafts and idle workers
//! - On cancellation, stops reading and drains in-flight tasks

pub mod bot;
pub mod router;
pub mod shutdown;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use sigil_core::Inbound;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub use bot::{BotContext, Collaborators};
pub use router::{Route, Router};
pub use shutdown::install_signal_handler;

/// How long in-flight messages get after shutdown begins.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How often expired conversation state is swept.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Events queued for one conversation before the reader waits.
const LANE_CAPACITY: usize = 64;

pub struct BotRuntime {
    router: Arc<Router>,
    drain_timeout: Duration,
    tracker: TaskTracker,
}

impl BotRuntime {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Conversation workers that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Runs until `cancel` fires or the inbound channel closes.
    pub async fn run(&self, mut inbound: mpsc::Receiver<Inbound>, cancel: CancellationToken) {
        info!("bot runtime running");
        let mut lanes = Lanes::new(&self.router, &self.tracker);
        let mut purge = tokio::time::interval(PURGE_INTERVAL);
        purge.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping bot runtime");
                    break;
                }
                event = inbound.recv() => {
                    let Some(event) = event else {
                        info!("inbound channel closed, stopping bot runtime");
                        break;
                    };
                    lanes.dispatch(event).await;
                }
                _ = purge.tick() => {
                    let purged = self.router.purge_expired();
                    if purged > 0 {
                        debug!(purged, "expired conversation state purged");
                    }
                    let retired = lanes.retire_idle();
                    if retired > 0 {
                        debug!(retired, "idle conversation workers retired");
                    }
                }
            }
        }

        // Closing every queue lets the workers finish what is already queued.
        drop(lanes);
        shutdown::drain_tasks(&self.tracker, self.drain_timeout).await;
        info!("bot runtime stopped");
    }
}

/// One conversation's queue and the worker draining it.
struct Lane {
    tx: mpsc::Sender<Inbound>,
    worker: JoinHandle<()>,
}

/// Per-conversation workers keyed by [`ConversationId::key`].
///
/// Events for the same conversation are routed strictly in arrival order.
/// A worker replacing a retired one waits for its predecessor first, so
/// ordering survives retirement too.
///
/// [`ConversationId::key`]: sigil_core::ConversationId::key
struct Lanes<'a> {
    router: &'a Arc<Router>,
    tracker: &'a TaskTracker,
    open: HashMap<String, Lane>,
    retiring: HashMap<String, JoinHandle<()>>,
}

impl<'a> Lanes<'a> {
    fn new(router: &'a Arc<Router>, tracker: &'a TaskTracker) -> Self {
        Self {
            router,
            tracker,
            open: HashMap::new(),
            retiring: HashMap::new(),
        }
    }

    async fn dispatch(&mut self, event: Inbound) {
        let key = event.conversation().key();
        let tx = self.lane(&key).tx.clone();
        let sent = tx.send(event).await;
        if let Err(mpsc::error::SendError(event)) = sent {
            warn!(conversation = %key, "conversation worker stopped, starting a new one");
            self.open.remove(&key);
            let tx = self.lane(&key).tx.clone();
            if tx.send(event).await.is_err() {
                warn!(conversation = %key, "event dropped, conversation worker unavailable");
            }
        }
    }

    fn lane(&mut self, key: &str) -> &mut Lane {
        match self.open.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let previous = self.retiring.remove(key);
                entry.insert(spawn_lane(self.router, self.tracker, previous))
            }
        }
    }

    /// Closes the queues that are currently empty.
    fn retire_idle(&mut self) -> usize {
        self.retiring.retain(|_, worker| !worker.is_finished());
        let idle: Vec<String> = self
            .open
            .iter()
            .filter(|(_, lane)| lane.tx.capacity() == lane.tx.max_capacity())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            if let Some(lane) = self.open.remove(key) {
                self.retiring.insert(key.clone(), lane.worker);
            }
        }
        idle.len()
    }
}

fn spawn_lane(
    router: &Arc<Router>,
    tracker: &TaskTracker,
    previous: Option<JoinHandle<()>>,
) -> Lane {
    let (tx, mut rx) = mpsc::channel::<Inbound>(LANE_CAPACITY);
    let router = Arc::clone(router);
    let worker = tracker.spawn(async move {
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        while let Some(event) = rx.recv().await {
            router.route(event).await;
        }
    });
    Lane { tx, worker }
}
