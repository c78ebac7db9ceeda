// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlated request/response over a single duplex byte stream.
//!
//! One reader task owns the read half. It splits the stream on newlines,
//! classifies each line, resolves pending requests by id and forwards push
//! events. Lines longer than [`MAX_LINE_BYTES`] are discarded unread.
//! The connection stays open. Writers share the write half behind a mutex so every record is
//! written as one uninterrupted line.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use sigil_core::SigilError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::protocol::{classify, Incoming, RpcRequest};

/// Methods whose timeout is taken as probable success: the daemon often
/// performs them without ever acknowledging.
pub const TIMEOUT_TOLERANT_METHODS: &[&str] = &["send", "updateGroup"];

/// Longest line logged verbatim at trace level.
const LOG_PREVIEW_CHARS: usize = 200;

/// Longest line accepted from the daemon, newline included.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Any stream the connection can run over.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// An in-flight correlated call.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    submitted_at: Instant,
    reply: oneshot::Sender<Result<Value, SigilError>>,
}

type PendingTable = DashMap<u64, PendingRequest>;

/// How a request was settled.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    /// The daemon answered with this result (`Null` for an empty body).
    Answered(Value),
    /// No answer arrived but the method tolerates that.
    AssumedDelivered,
}

impl RpcReply {
    pub fn into_value(self) -> Value {
        match self {
            RpcReply::Answered(value) => value,
            RpcReply::AssumedDelivered => Value::Null,
        }
    }
}

/// Shared id source. Reused across reconnects so ids never repeat within
/// a process.
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// A live connection to the daemon.
pub struct RpcConnection {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Arc<PendingTable>,
    ids: Arc<IdGenerator>,
    request_timeout: Duration,
    closed: CancellationToken,
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("pending", &self.pending.len())
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}

impl RpcConnection {
    /// Takes over `stream` and spawns its reader task.
    ///
    /// Push event params are forwarded to `events`.
    pub fn open<S: DuplexStream>(
        stream: S,
        ids: Arc<IdGenerator>,
        request_timeout: Duration,
        events: mpsc::Sender<Value>,
    ) -> Arc<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let pending = Arc::new(PendingTable::new());
        let closed = CancellationToken::new();

        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&pending),
            events,
            closed.clone(),
        ));

        Arc::new(Self {
            writer: Mutex::new(Box::new(write_half)),
            pending,
            ids,
            request_timeout,
            closed,
        })
    }

    /// Sends `method` and waits for the matching response.
    ///
    /// A missing answer rejects with [`SigilError::RequestTimeout`] after
    /// the request timeout, except for [`TIMEOUT_TOLERANT_METHODS`], which
    /// settle as [`RpcReply::AssumedDelivered`].
    pub async fn request(&self, method: &str, params: Value) -> Result<RpcReply, SigilError> {
        let id = self.ids.next();
        let line = RpcRequest::call(method, &params, id)
            .to_line()
            .map_err(|e| SigilError::Internal(format!("failed to encode `{method}`: {e}")))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                submitted_at: Instant::now(),
                reply: reply_tx,
            },
        );

        // The reader marks the connection closed before draining the table,
        // so an entry inserted after the drain is caught here.
        if self.closed.is_cancelled() {
            self.pending.remove(&id);
            return Err(SigilError::ConnectionLost("connection closed".into()));
        }

        if let Err(e) = self.write_line(&line).await {
            self.pending.remove(&id);
            return Err(e);
        }
        debug!(id, method, "request sent");

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(Ok(result))) => Ok(RpcReply::Answered(result)),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(SigilError::ConnectionLost(
                "connection dropped before a response arrived".into(),
            )),
            Err(_) => {
                // Only this id is evicted; other pending calls keep their own deadlines.
                self.pending.remove(&id);
                if TIMEOUT_TOLERANT_METHODS.contains(&method) {
                    warn!(
                        id,
                        method,
                        timeout = ?self.request_timeout,
                        "no response from daemon, assuming delivered"
                    );
                    Ok(RpcReply::AssumedDelivered)
                } else {
                    Err(SigilError::RequestTimeout {
                        method: method.to_string(),
                        id,
                        timeout: self.request_timeout,
                    })
                }
            }
        }
    }

    /// Sends a record that expects no response.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), SigilError> {
        let line = RpcRequest::notification(method, &params)
            .to_line()
            .map_err(|e| SigilError::Internal(format!("failed to encode `{method}`: {e}")))?;
        self.write_line(&line).await
    }

    async fn write_line(&self, line: &str) -> Result<(), SigilError> {
        if self.closed.is_cancelled() {
            return Err(SigilError::ConnectionLost("connection closed".into()));
        }
        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        result.map_err(|e| {
            self.closed.cancel();
            SigilError::ConnectionLost(format!("write failed: {e}"))
        })
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed from either side.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Closes the connection. Outstanding requests fail with `ConnectionLost`.
    pub async fn close(&self) {
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        fail_all(&self.pending, "connection closed");
    }
}

fn fail_all(pending: &PendingTable, reason: &str) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, request)) = pending.remove(&id) {
            debug!(id, method = %request.method, "failing pending request");
            let _ = request
                .reply
                .send(Err(SigilError::ConnectionLost(reason.to_string())));
        }
    }
}

async fn read_loop<R>(
    reader: R,
    pending: Arc<PendingTable>,
    events: mpsc::Sender<Value>,
    closed: CancellationToken,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(4096);

    let reason = loop {
        buf.clear();
        let read = tokio::select! {
            read = read_capped_line(&mut reader, &mut buf, MAX_LINE_BYTES) => read,
            () = closed.cancelled() => break "connection closed",
        };
        match read {
            Ok(LineRead::Eof) => break "daemon closed the connection",
            Ok(LineRead::Line) => {
                let line = String::from_utf8_lossy(&buf);
                handle_line(&line, &pending, &events).await;
            }
            Ok(LineRead::Oversized(len)) => {
                warn!(len, max = MAX_LINE_BYTES, "oversized line from daemon dropped");
            }
            Err(e) => {
                warn!(error = %e, "read from daemon failed");
                break "read failed";
            }
        }
    };

    debug!(reason, pending = pending.len(), "reader stopped");
    closed.cancel();
    fail_all(&pending, reason);
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    /// `buf` holds one line, newline included when the stream had one.
    Line,
    /// A line of this many bytes was skipped.
    Oversized(usize),
}

/// Reads one newline-terminated line into `buf`, keeping at most `max`
/// bytes in memory. Longer lines are consumed and discarded.
async fn read_capped_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut discarded = 0usize;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if discarded > 0 {
                LineRead::Oversized(discarded)
            } else if buf.is_empty() {
                LineRead::Eof
            } else {
                LineRead::Line
            });
        }

        let (used, complete) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        if discarded == 0 && buf.len() + used <= max {
            buf.extend_from_slice(&available[..used]);
        } else {
            discarded += buf.len() + used;
            buf.clear();
        }
        reader.consume(used);

        if complete {
            return Ok(if discarded > 0 {
                LineRead::Oversized(discarded)
            } else {
                LineRead::Line
            });
        }
    }
}

async fn handle_line(line: &str, pending: &PendingTable, events: &mpsc::Sender<Value>) {
    match classify(line) {
        Incoming::Push(params) => {
            if events.send(params).await.is_err() {
                debug!("push event dropped, no consumer");
            }
        }
        Incoming::Response { id, outcome } => match pending.remove(&id) {
            Some((_, request)) => {
                trace!(
                    id,
                    method = %request.method,
                    elapsed = ?request.submitted_at.elapsed(),
                    "response matched"
                );
                let result = outcome.map_err(|e| SigilError::Rpc {
                    method: request.method.clone(),
                    code: e.code,
                    message: e.message,
                });
                let _ = request.reply.send(result);
            }
            None => match outcome {
                Err(e) => warn!(id, error = %e.message, "daemon error for unknown request"),
                Ok(_) => debug!(id, "response for unknown or expired request"),
            },
        },
        Incoming::OrphanError(e) => {
            warn!(code = ?e.code, error = %e.message, "daemon reported an error");
        }
        Incoming::Ignored => {
            let preview: String = line.chars().take(LOG_PREVIEW_CHARS).collect();
            trace!(line = %preview.trim_end(), "ignoring unparseable line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, DuplexStream as MemStream};

    fn connect(timeout: Duration) -> (Arc<RpcConnection>, MemStream, mpsc::Receiver<Value>) {
        let (client, daemon) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = mpsc::channel(16);
        let conn = RpcConnection::open(client, Arc::new(IdGenerator::default()), timeout, tx);
        (conn, daemon, rx)
    }

    async fn read_request(daemon: &mut MemStream) -> Value {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            daemon.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        serde_json::from_slice(&line).unwrap()
    }

    #[tokio::test]
    async fn capped_reader_skips_long_lines_and_keeps_going() {
        let input: &[u8] = b"short\nthis line is too long\nok\ntail";
        let mut reader = BufReader::with_capacity(4, input);
        let mut buf = Vec::new();

        assert_eq!(read_capped_line(&mut reader, &mut buf, 8).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"short\n");
        buf.clear();
        assert_eq!(
            read_capped_line(&mut reader, &mut buf, 8).await.unwrap(),
            LineRead::Oversized(22)
        );
        assert!(buf.is_empty());
        assert_eq!(read_capped_line(&mut reader, &mut buf, 8).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"ok\n");
        buf.clear();
        assert_eq!(read_capped_line(&mut reader, &mut buf, 8).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"tail");
        buf.clear();
        assert_eq!(read_capped_line(&mut reader, &mut buf, 8).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn oversized_line_is_dropped_without_closing_the_connection() {
        let (conn, mut daemon, _rx) = connect(Duration::from_secs(5));
        let call = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.request("listGroups", json!({})).await }
        });
        let request = read_request(&mut daemon).await;

        let mut flood = vec![b'x'; MAX_LINE_BYTES + 10];
        flood.push(b'\n');
        daemon.write_all(&flood).await.unwrap();
        let response = format!("{{\"jsonrpc\":\"2.0\",\"id\":{},\"result\":[]}}\n", request["id"]);
        daemon.write_all(response.as_bytes()).await.unwrap();

        let reply = call.await.unwrap().unwrap();
        assert_eq!(reply, RpcReply::Answered(json!([])));
        assert!(!conn.is_closed());
        assert!(logs_contain("oversized line from daemon dropped"));
    }

    #[tokio::test]
    async fn ids_are_unique_and_increasing() {
        let ids = IdGenerator::default();
        let a = ids.next();
        let b = ids.next();
        assert!(b > a);
    }

    #[tokio::test]
    async fn fragmented_response_is_reassembled() {
        let (conn, mut daemon, _rx) = connect(Duration::from_secs(5));
        let call = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.request("listGroups", json!({})).await }
        });

        let request = read_request(&mut daemon).await;
        let id = request["id"].as_u64().unwrap();
        let response = format!("{{\"jsonrpc\":\"2.0\",\"id\":{id},\"result\":[]}}\n");
        let (head, tail) = response.split_at(10);
        daemon.write_all(head.as_bytes()).await.unwrap();
        tokio::task::yield_now().await;
        daemon.write_all(tail.as_bytes()).await.unwrap();

        let reply = call.await.unwrap().unwrap();
        assert_eq!(reply, RpcReply::Answered(json!([])));
        assert_eq!(conn.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn tolerated_timeout_is_logged() {
        let (conn, mut daemon, _rx) = connect(Duration::from_secs(10));
        let call = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.request("send", json!({"recipient": ["+1"]})).await }
        });
        let _ = read_request(&mut daemon).await;
        assert_eq!(call.await.unwrap().unwrap(), RpcReply::AssumedDelivered);
        assert!(logs_contain("assuming delivered"));
    }

    #[tokio::test]
    async fn eof_fails_pending_with_connection_lost() {
        let (conn, mut daemon, _rx) = connect(Duration::from_secs(5));
        let call = tokio::spawn({
            let conn = Arc::clone(&conn);
            async move { conn.request("listGroups", json!({})).await }
        });
        let _ = read_request(&mut daemon).await;
        drop(daemon);

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, SigilError::ConnectionLost(_)));
        conn.closed().await;
        assert!(conn.is_closed());
    }
}
