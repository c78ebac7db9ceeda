// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sigil bot runtime.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Sigil crates.
///
/// Expired conversation state is deliberately absent: eviction is silent
/// and never surfaces as an error.
#[derive(Debug, Error)]
pub enum SigilError {
    /// Configuration errors (invalid values, missing required settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// The daemon subprocess never exposed its connection endpoint.
    #[error("daemon did not expose {endpoint} within {waited:?}")]
    DaemonStartTimeout { endpoint: String, waited: Duration },

    /// Spawning, supervising or stopping the daemon subprocess failed.
    #[error("daemon error: {message}")]
    Daemon {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The duplex connection to the daemon is closed or unusable.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Reconnection gave up after the configured number of attempts.
    #[error("reconnect abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// A correlated request received no response in time.
    #[error("request `{method}` (id {id}) timed out after {timeout:?}")]
    RequestTimeout {
        method: String,
        id: u64,
        timeout: Duration,
    },

    /// The daemon answered a request with an error record.
    #[error("daemon rejected `{method}`: {message}")]
    Rpc {
        method: String,
        code: Option<i64>,
        message: String,
    },

    /// A command handler failed.
    #[error("{message}")]
    Handler { command: String, message: String },

    /// An inbound record could not be parsed.
    #[error("failed to parse inbound record: {0}")]
    Parse(String),

    /// AI or text-generation collaborator errors.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The actor is not allowed to perform the requested action.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SigilError {
    /// Convenience constructor for handler failures.
    pub fn handler(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether this error should stop the whole process.
    ///
    /// Only failing to ever reach the daemon endpoint and exhausting the
    /// reconnect budget are fatal; everything else is contained.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SigilError::DaemonStartTimeout { .. } | SigilError::ReconnectExhausted { .. }
        )
    }

    /// The text shown to chat users when this error ends a command.
    ///
    /// Never includes source chains or debug formatting.
    pub fn user_message(&self) -> String {
        match self {
            SigilError::Handler { message, .. } => message.clone(),
            SigilError::Unauthorized(reason) => format!("not authorized: {reason}"),
            SigilError::RequestTimeout { .. } => "the messaging daemon did not answer in time".into(),
            SigilError::ConnectionLost(_) => "the messaging daemon is unavailable right now".into(),
            SigilError::Provider { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
