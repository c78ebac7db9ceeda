// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnecting daemon client.
//!
//! [`SignalClient::run`] is the only task that opens connections, so
//! reconnect attempts are serialized. Callers issue requests against
//! whichever connection is current; while disconnected they fail fast with
//! `ConnectionLost`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde_json::{json, Value};
use sigil_core::types::{GroupInfo, GroupUpdate, HealthStatus, SendReceipt};
use sigil_core::{ConversationId, Messenger, OutboundMessage, PluginAdapter, SigilError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::rpc::{DuplexStream, IdGenerator, RpcConnection, RpcReply};
use crate::{publish, TransportStatus};

/// A boxed stream produced by a [`Connector`].
pub type BoxStream = Box<dyn DuplexStream>;

/// Opens the byte stream to the daemon.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> std::io::Result<BoxStream>;
}

/// Connects to the daemon's unix socket.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for UnixConnector {
    #[cfg(unix)]
    async fn connect(&self) -> std::io::Result<BoxStream> {
        let stream = tokio::net::UnixStream::connect(&self.path).await?;
        Ok(Box::new(stream))
    }

    #[cfg(not(unix))]
    async fn connect(&self) -> std::io::Result<BoxStream> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("unix sockets unsupported, cannot reach {}", self.path.display()),
        ))
    }
}

/// Connection tuning.
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(2),
        }
    }
}

/// Delay before reconnect attempt `attempt` (1-based): `base × attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}

/// Client for the daemon's JSON-RPC interface.
pub struct SignalClient {
    current: ArcSwapOption<RpcConnection>,
    ids: Arc<IdGenerator>,
    options: ClientOptions,
    status: watch::Sender<TransportStatus>,
}

impl SignalClient {
    pub fn new(options: ClientOptions, status: watch::Sender<TransportStatus>) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwapOption::empty(),
            ids: Arc::new(IdGenerator::default()),
            options,
            status,
        })
    }

    pub fn status(&self) -> watch::Receiver<TransportStatus> {
        self.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.current
            .load()
            .as_ref()
            .is_some_and(|conn| !conn.is_closed())
    }

    /// Connects, subscribes to push events and keeps reconnecting until
    /// `shutdown` fires or the reconnect budget is spent.
    pub async fn run(
        self: Arc<Self>,
        connector: Arc<dyn Connector>,
        events: mpsc::Sender<Value>,
        shutdown: CancellationToken,
    ) {
        let mut attempt: u32 = 0;
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match connector.connect().await {
                Ok(stream) => {
                    let conn = RpcConnection::open(
                        stream,
                        Arc::clone(&self.ids),
                        self.options.request_timeout,
                        events.clone(),
                    );
                    match conn.notify("subscribeReceive", json!({})).await {
                        Ok(()) => {
                            attempt = 0;
                            self.current.store(Some(Arc::clone(&conn)));
                            publish(&self.status, TransportStatus::Connected);
                            info!("connected to signal daemon");

                            let stopping = tokio::select! {
                                () = conn.closed() => false,
                                () = shutdown.cancelled() => true,
                            };
                            self.current.store(None);
                            if stopping {
                                conn.close().await;
                                break;
                            }
                            warn!("connection to signal daemon lost");
                        }
                        Err(e) => {
                            warn!(error = %e, "subscribe failed");
                            conn.close().await;
                        }
                    }
                }
                Err(e) => warn!(attempt, error = %e, "cannot connect to signal daemon"),
            }

            attempt += 1;
            if attempt > self.options.max_reconnect_attempts {
                error!(
                    attempts = self.options.max_reconnect_attempts,
                    "giving up on the signal daemon"
                );
                let reason = SigilError::ReconnectExhausted {
                    attempts: self.options.max_reconnect_attempts,
                };
                publish(&self.status, TransportStatus::Failed(reason.to_string()));
                return;
            }

            let delay = backoff_delay(self.options.reconnect_base_delay, attempt);
            publish(&self.status, TransportStatus::Reconnecting { attempt });
            debug!(attempt, ?delay, "reconnecting after delay");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => break,
            }
        }
        publish(&self.status, TransportStatus::Stopped);
    }

    /// Issues `method` on the current connection.
    pub async fn request(&self, method: &str, params: Value) -> Result<RpcReply, SigilError> {
        let conn = self
            .current
            .load_full()
            .ok_or_else(|| SigilError::ConnectionLost("not connected to the daemon".into()))?;
        conn.request(method, params).await
    }
}

/// Builds `send` params: `groupId` for groups, `recipient` otherwise.
pub(crate) fn send_params(msg: &OutboundMessage) -> Value {
    let mut params = json!({ "message": msg.text });
    match &msg.conversation {
        ConversationId::Group(id) => params["groupId"] = json!(id),
        ConversationId::Direct(peer) => params["recipient"] = json!([peer.as_str()]),
    }
    if let Some(quote) = &msg.quote {
        params["quoteTimestamp"] = json!(quote.timestamp);
        params["quoteAuthor"] = json!(quote.author);
        if let Some(text) = &quote.text {
            params["quoteMessage"] = json!(text);
        }
    }
    if !msg.attachments.is_empty() {
        params["attachments"] = json!(msg.attachments);
    }
    params
}

fn update_group_params(group_id: &str, update: &GroupUpdate) -> Value {
    let mut params = json!({ "groupId": group_id });
    if !update.add_members.is_empty() {
        params["addMembers"] = json!(update.add_members);
    }
    if !update.remove_members.is_empty() {
        params["removeMembers"] = json!(update.remove_members);
    }
    params
}

/// Member lists come back as objects with `number`/`uuid` or as bare strings.
fn identifiers(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::String(s) => out.push(s.clone()),
            Value::Object(obj) => {
                for key in ["number", "uuid"] {
                    if let Some(id) = obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()) {
                        out.push(id.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    out
}

pub(crate) fn parse_groups(value: &Value) -> Vec<GroupInfo> {
    value
        .as_array()
        .map(|groups| {
            groups
                .iter()
                .filter_map(|g| {
                    Some(GroupInfo {
                        id: g.get("id").and_then(Value::as_str)?.to_string(),
                        name: g.get("name").and_then(Value::as_str).map(str::to_string),
                        members: identifiers(g.get("members")),
                        admins: identifiers(g.get("admins")),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Messenger for SignalClient {
    async fn send(&self, msg: OutboundMessage) -> Result<SendReceipt, SigilError> {
        let reply = self.request("send", send_params(&msg)).await?;
        Ok(SendReceipt {
            timestamp: match reply {
                RpcReply::Answered(value) => value.get("timestamp").and_then(Value::as_i64),
                RpcReply::AssumedDelivered => None,
            },
        })
    }

    async fn update_group(&self, group_id: &str, update: GroupUpdate) -> Result<(), SigilError> {
        if update.is_empty() {
            return Ok(());
        }
        self.request("updateGroup", update_group_params(group_id, &update))
            .await
            .map(|_| ())
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, SigilError> {
        let reply = self.request("listGroups", json!({})).await?;
        Ok(parse_groups(&reply.into_value()))
    }
}

#[async_trait]
impl PluginAdapter for SignalClient {
    fn name(&self) -> &str {
        "signal"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, SigilError> {
        let status = self.status.borrow().clone();
        Ok(match status {
            TransportStatus::Connected if self.is_connected() => HealthStatus::Healthy,
            TransportStatus::Reconnecting { attempt } => {
                HealthStatus::Degraded(format!("reconnecting (attempt {attempt})"))
            }
            TransportStatus::DaemonRestarting { attempt } => {
                HealthStatus::Degraded(format!("daemon restarting (attempt {attempt})"))
            }
            other => HealthStatus::Unhealthy(other.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), SigilError> {
        if let Some(conn) = self.current.swap(None) {
            conn.close().await;
        }
        Ok(())
    }
}
