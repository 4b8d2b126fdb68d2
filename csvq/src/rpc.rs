//! JSON-RPC 2.0 dispatcher exposing the gateway as tools.
//!
//! Implements the subset of the Model Context Protocol a tool server needs: `initialize`,
//! `ping`, `tools/list` and `tools/call`. Messages without an `id` are notifications and never
//! get a reply. Transports hand one message at a time to [`Dispatcher::handle_line`].

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::gateway::Gateway;
use crate::tools::{ToolCall, tool_definitions};

/// Protocol revisions this server can speak, newest last.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];
pub const SERVER_NAME: &str = "csvq";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    fn new(id: Value, outcome: Outcome) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            outcome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    gateway: Gateway,
}

impl Dispatcher {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Handle one serialized message. Returns the serialized reply, if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await?,
            Err(err) => Response::new(
                Value::Null,
                Outcome::Error(RpcError::new(PARSE_ERROR, format!("parse error: {err}"))),
            ),
        };
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize rpc response");
                None
            }
        }
    }

    pub async fn handle_message(&self, message: Value) -> Option<Response> {
        let Value::Object(mut message) = message else {
            return Some(Response::new(
                Value::Null,
                Outcome::Error(RpcError::new(INVALID_REQUEST, "request must be an object")),
            ));
        };

        let id = message.remove("id");
        let method = match message.remove("method") {
            Some(Value::String(method)) => method,
            _ => {
                return Some(Response::new(
                    id.unwrap_or(Value::Null),
                    Outcome::Error(RpcError::new(INVALID_REQUEST, "missing method")),
                ));
            }
        };
        let params = message.remove("params").unwrap_or(Value::Null);

        let Some(id) = id else {
            tracing::debug!(method = %method, "notification");
            return None;
        };

        tracing::debug!(method = %method, "rpc request");
        let outcome = match self.dispatch(&method, params).await {
            Ok(result) => Outcome::Result(result),
            Err(err) => {
                tracing::warn!(method = %method, code = err.code, reason = %err.message, "rpc error");
                Outcome::Error(err)
            }
        };
        Some(Response::new(id, outcome))
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_result(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let Value::Object(mut params) = params else {
            return Err(RpcError::new(INVALID_PARAMS, "tools/call expects an object"));
        };
        let name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(RpcError::new(INVALID_PARAMS, "tools/call requires a tool name")),
        };
        let arguments = params.remove("arguments").unwrap_or(Value::Null);
        let call =
            ToolCall::parse(&name, arguments).map_err(|msg| RpcError::new(INVALID_PARAMS, msg))?;

        Ok(match call.invoke(&self.gateway).await {
            Ok(value) => tool_success(value),
            Err(err) => tool_failure(&err),
        })
    }
}

fn initialize_result(params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    let latest = SUPPORTED_PROTOCOL_VERSIONS[SUPPORTED_PROTOCOL_VERSIONS.len() - 1];
    let version = requested
        .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
        .unwrap_or(latest);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

fn tool_success(value: Value) -> Value {
    let structured = match &value {
        Value::Object(_) => value.clone(),
        other => {
            let mut wrapper = Map::new();
            wrapper.insert("result".into(), other.clone());
            Value::Object(wrapper)
        }
    };
    json!({
        "content": [{ "type": "text", "text": value.to_string() }],
        "structuredContent": structured,
        "isError": false,
    })
}

fn tool_failure(err: &csvq_result::Error) -> Value {
    json!({
        "content": [{ "type": "text", "text": format!("{}: {}", err.kind().code(), err.message()) }],
        "isError": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayConfig;
    use crate::policy::AccessPolicy;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Gateway::new(GatewayConfig::new(AccessPolicy::Unrestricted)))
    }

    async fn roundtrip(line: &str) -> Value {
        let reply = dispatcher().handle_line(line).await.expect("reply");
        serde_json::from_str(&reply).expect("json reply")
    }

    #[tokio::test]
    async fn initialize_echoes_supported_versions() {
        let reply = roundtrip(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        )
        .await;
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(reply["result"]["serverInfo"]["name"], "csvq");
        assert!(reply["result"]["capabilities"]["tools"].is_object());

        let reply = roundtrip(
            r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["protocolVersion"], "2025-06-18");
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let reply = dispatcher()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn protocol_errors() {
        let reply = roundtrip("{not json").await;
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
        assert!(reply["id"].is_null());

        let reply = roundtrip("[1,2]").await;
        assert_eq!(reply["error"]["code"], INVALID_REQUEST);

        let reply = roundtrip(r#"{"jsonrpc":"2.0","id":"x","method":"resources/list"}"#).await;
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(reply["id"], "x");

        let reply = roundtrip(
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn ping_is_empty_object() {
        let reply = roundtrip(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).await;
        assert_eq!(reply["result"], json!({}));
        assert!(reply.get("error").is_none());
    }

    #[test]
    fn tool_results_wrap_non_objects() {
        let success = tool_success(json!([1, 2]));
        assert_eq!(success["structuredContent"], json!({"result": [1, 2]}));
        assert_eq!(success["content"][0]["text"], "[1,2]");
        assert_eq!(success["isError"], false);

        let failure = tool_failure(&csvq_result::Error::PolicyViolation("nope".into()));
        assert_eq!(failure["content"][0]["text"], "POLICY_VIOLATION: nope");
        assert_eq!(failure["isError"], true);
    }
}
