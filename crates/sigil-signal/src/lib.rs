// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! signal-cli transport for the Sigil bot runtime.
//!
//! Supervises the daemon subprocess, keeps a JSON-RPC connection to its
//! socket alive, and turns push events into normalized [`Inbound`] values
//! delivered over a channel.

pub mod client;
pub mod daemon;
pub mod envelope;
pub mod protocol;
pub mod rpc;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sigil_config::SigilConfig;
use sigil_core::{BotIdentity, Inbound, SigilError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use client::{backoff_delay, ClientOptions, Connector, SignalClient, UnixConnector};
pub use daemon::{DaemonConfig, DaemonProcess, RestartPolicy};
pub use rpc::{RpcConnection, RpcReply, TIMEOUT_TOLERANT_METHODS};

/// Capacity of the raw push-event and normalized inbound channels.
const CHANNEL_CAPACITY: usize = 256;

/// Connectivity state published by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Starting,
    Connected,
    Reconnecting { attempt: u32 },
    DaemonRestarting { attempt: u32 },
    Stopped,
    /// The transport gave up; fatal to the process.
    Failed(String),
}

impl TransportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportStatus::Stopped | TransportStatus::Failed(_))
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::Starting => write!(f, "starting"),
            TransportStatus::Connected => write!(f, "connected"),
            TransportStatus::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            TransportStatus::DaemonRestarting { attempt } => {
                write!(f, "daemon restarting (attempt {attempt})")
            }
            TransportStatus::Stopped => write!(f, "stopped"),
            TransportStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Publishes `next` unless the status is already terminal.
pub(crate) fn publish(tx: &watch::Sender<TransportStatus>, next: TransportStatus) {
    tx.send_if_modified(|current| {
        if current.is_terminal() || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

/// Settings for [`SignalChannel::start`].
#[derive(Debug, Clone)]
pub struct SignalSettings {
    pub bot: BotIdentity,
    /// `None` connects to an already running daemon.
    pub daemon: Option<DaemonConfig>,
    pub socket_path: std::path::PathBuf,
    pub client: ClientOptions,
}

impl SignalSettings {
    pub fn from_config(config: &SigilConfig) -> Result<Self, SigilError> {
        let account = config
            .signal
            .account
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| SigilError::Config("signal.account is required".into()))?;
        let socket_path = config.socket_path();
        let daemon = config.signal.spawn_daemon.then(|| DaemonConfig {
            cli_path: config.signal.cli_path.clone(),
            account: account.clone(),
            config_dir: config.signal_config_dir(),
            socket_path: socket_path.clone(),
            start_timeout: config.signal.start_timeout(),
            restart: RestartPolicy {
                max_restarts: config.signal.max_restarts,
                delay: config.signal.restart_delay(),
            },
            shutdown_grace: config.signal.shutdown_grace(),
        });
        Ok(Self {
            bot: BotIdentity::new(account, config.signal.account_uuid.clone()),
            daemon,
            socket_path,
            client: ClientOptions {
                request_timeout: config.signal.request_timeout(),
                max_reconnect_attempts: config.signal.max_reconnect_attempts,
                reconnect_base_delay: config.signal.reconnect_base_delay(),
            },
        })
    }
}

/// The running transport: daemon supervisor, connection supervisor and
/// the normalizing pump.
pub struct SignalChannel {
    client: Arc<SignalClient>,
    status: watch::Receiver<TransportStatus>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SignalChannel {
    /// Starts the daemon (when configured) and the connection.
    ///
    /// Returns once the daemon socket exists; the connection itself is
    /// established in the background. Normalized traffic arrives on the
    /// returned receiver in arrival order.
    pub async fn start(
        settings: SignalSettings,
    ) -> Result<(Self, mpsc::Receiver<Inbound>), SigilError> {
        let connector = Arc::new(UnixConnector::new(&settings.socket_path));
        Self::start_with(settings, connector).await
    }

    /// Like [`start`](Self::start) with a custom connector.
    pub async fn start_with(
        settings: SignalSettings,
        connector: Arc<dyn Connector>,
    ) -> Result<(Self, mpsc::Receiver<Inbound>), SigilError> {
        let (status_tx, status_rx) = watch::channel(TransportStatus::Starting);
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        if let Some(daemon_config) = settings.daemon.clone() {
            let process = DaemonProcess::start(&daemon_config).await?;
            tasks.push(tokio::spawn(daemon::supervise(
                daemon_config,
                process,
                status_tx.clone(),
                shutdown.clone(),
            )));
        }

        let client = SignalClient::new(settings.client, status_tx);
        let (raw_tx, raw_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tasks.push(tokio::spawn(Arc::clone(&client).run(
            connector,
            raw_tx,
            shutdown.clone(),
        )));
        tasks.push(tokio::spawn(pump(raw_rx, inbound_tx, settings.bot)));

        info!(socket = %settings.socket_path.display(), "signal transport started");
        Ok((
            Self {
                client,
                status: status_rx,
                shutdown,
                tasks,
            },
            inbound_rx,
        ))
    }

    /// The client, usable as a [`Messenger`](sigil_core::Messenger).
    pub fn client(&self) -> Arc<SignalClient> {
        Arc::clone(&self.client)
    }

    pub fn status(&self) -> watch::Receiver<TransportStatus> {
        self.status.clone()
    }

    /// Closes the connection and stops the daemon with its grace period.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "transport task ended abnormally");
            }
        }
        info!("signal transport stopped");
    }
}

async fn pump(
    mut raw: mpsc::Receiver<Value>,
    inbound: mpsc::Sender<Inbound>,
    bot: BotIdentity,
) {
    while let Some(params) = raw.recv().await {
        match envelope::normalize(&params, &bot) {
            Some(event) => {
                if inbound.send(event).await.is_err() {
                    debug!("inbound receiver dropped, stopping pump");
                    return;
                }
            }
            None => debug!("push event produced nothing actionable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_is_sticky() {
        let (tx, rx) = watch::channel(TransportStatus::Starting);
        publish(&tx, TransportStatus::Connected);
        assert_eq!(*rx.borrow(), TransportStatus::Connected);
        publish(&tx, TransportStatus::Failed("gone".into()));
        publish(&tx, TransportStatus::Reconnecting { attempt: 1 });
        assert_eq!(*rx.borrow(), TransportStatus::Failed("gone".into()));
    }

    #[test]
    fn settings_require_account() {
        let config = SigilConfig::default();
        assert!(SignalSettings::from_config(&config).is_err());

        let mut config = SigilConfig::default();
        config.signal.account = Some("+15550000000".into());
        config.signal.spawn_daemon = false;
        let settings = SignalSettings::from_config(&config).unwrap();
        assert!(settings.daemon.is_none());
        assert!(settings.bot.is_self("+15550000000"));
        assert_eq!(settings.client.max_reconnect_attempts, 5);
    }
}
