// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newline-delimited JSON-RPC records exchanged with the daemon.

use serde::Serialize;
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Method name of daemon push events.
pub const RECEIVE_METHOD: &str = "receive";

/// Outbound request or notification. Notifications carry no id.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl<'a> RpcRequest<'a> {
    pub fn call(method: &'a str, params: &'a Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: Some(id),
        }
    }

    pub fn notification(method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: None,
        }
    }

    /// Serialized record including the terminating newline.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// The `error` member of a daemon response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: Option<i64>,
    pub message: String,
}

impl RpcError {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(obj) => Self {
                code: obj.get("code").and_then(Value::as_i64),
                message: obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
            },
            Value::String(s) => Self {
                code: None,
                message: s.clone(),
            },
            other => Self {
                code: None,
                message: other.to_string(),
            },
        }
    }
}

/// What a single inbound line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// A `receive` push event; holds the `params` object.
    Push(Value),
    /// A response carrying a correlation id.
    Response {
        id: u64,
        outcome: Result<Value, RpcError>,
    },
    /// An error record that names no request we can match.
    OrphanError(RpcError),
    /// Anything else: unparseable fragments, unknown notifications.
    Ignored,
}

/// Classify one line read from the connection.
///
/// Never fails: fragments and malformed records come back as
/// [`Incoming::Ignored`].
pub fn classify(line: &str) -> Incoming {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Incoming::Ignored;
    }
    let Ok(Value::Object(record)) = serde_json::from_str::<Value>(trimmed) else {
        return Incoming::Ignored;
    };

    if record.get("method").and_then(Value::as_str) == Some(RECEIVE_METHOD) {
        return match record.get("params") {
            Some(params) => Incoming::Push(params.clone()),
            None => Incoming::Ignored,
        };
    }

    let error = record.get("error").filter(|e| !e.is_null());
    match (record.get("id").and_then(parse_id), error) {
        (Some(id), Some(error)) => Incoming::Response {
            id,
            outcome: Err(RpcError::from_value(error)),
        },
        (Some(id), None) => Incoming::Response {
            id,
            // Success may legitimately carry no body.
            outcome: Ok(record.get("result").cloned().unwrap_or(Value::Null)),
        },
        (None, Some(error)) => Incoming::OrphanError(RpcError::from_value(error)),
        (None, None) => Incoming::Ignored,
    }
}

/// Ids are numeric on the way out but some daemons echo them as strings.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_line_is_newline_terminated() {
        let params = json!({"groupId": "abc", "message": "hi"});
        let line = RpcRequest::call("send", &params, 7).to_line().unwrap();
        assert!(line.ends_with('\n'));
        let parsed: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["method"], "send");
        assert_eq!(parsed["id"], 7);
        assert_eq!(parsed["params"]["groupId"], "abc");
    }

    #[test]
    fn notification_has_no_id() {
        let params = json!({});
        let line = RpcRequest::notification("subscribeReceive", &params)
            .to_line()
            .unwrap();
        assert!(!line.contains("\"id\""));
    }

    #[test]
    fn push_event_is_recognised() {
        let line = r#"{"jsonrpc":"2.0","method":"receive","params":{"envelope":{"sourceNumber":"+1"}}}"#;
        match classify(line) {
            Incoming::Push(params) => assert_eq!(params["envelope"]["sourceNumber"], "+1"),
            other => panic!("expected push, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_success() {
        assert_eq!(
            classify(r#"{"jsonrpc":"2.0","id":3}"#),
            Incoming::Response {
                id: 3,
                outcome: Ok(Value::Null)
            }
        );
    }

    #[test]
    fn string_ids_are_accepted() {
        assert!(matches!(
            classify(r#"{"id":"12","result":{"timestamp":5}}"#),
            Incoming::Response { id: 12, outcome: Ok(_) }
        ));
    }

    #[test]
    fn error_response_carries_daemon_message() {
        let incoming = classify(r#"{"id":4,"error":{"code":-32602,"message":"Invalid group"}}"#);
        assert_eq!(
            incoming,
            Incoming::Response {
                id: 4,
                outcome: Err(RpcError {
                    code: Some(-32602),
                    message: "Invalid group".into()
                })
            }
        );
    }

    #[test]
    fn orphan_error_and_fragments() {
        assert!(matches!(
            classify(r#"{"error":{"message":"boom"}}"#),
            Incoming::OrphanError(_)
        ));
        assert_eq!(classify(r#"{"jsonrpc":"2.0","id":"#), Incoming::Ignored);
        assert_eq!(classify("   "), Incoming::Ignored);
        assert_eq!(classify("[1,2,3]"), Incoming::Ignored);
    }
}
