//! JSON-RPC 2.0 message types and MCP handshake payloads.
//!
//! Reference: <https://modelcontextprotocol.io>

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use toolgate_core::TransportError;

/// Protocol revision requested during `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Any message received from a server.
///
/// Responses carry `id` plus `result` or `error`; server-initiated
/// requests and notifications carry `method`.
#[derive(Debug, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcMessage {
    /// Numeric id of a response; `None` for requests and notifications.
    pub fn response_id(&self) -> Option<u64> {
        if self.method.is_some() {
            return None;
        }
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Convert a response into its result value.
    pub fn into_result(self) -> Result<Value, TransportError> {
        if let Some(err) = self.error {
            return Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| TransportError::Protocol("Missing result in response".to_string()))
    }
}

/// Result of `initialize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    #[serde(default)]
    pub capabilities: PeerCapabilities,
}

/// Server information from `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Capability flags advertised by the server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerCapabilities {
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub resources: Option<Value>,
    #[serde(default)]
    pub prompts: Option<Value>,
}

/// Parameters for the `initialize` request.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": "toolgate",
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    })
}

/// Parameters for `tools/call`.
pub fn call_tool_params(name: &str, arguments: Value, meta: Option<Value>) -> Value {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    let mut params = json!({
        "name": name,
        "arguments": arguments,
    });
    if let (Some(meta), Some(obj)) = (meta, params.as_object_mut()) {
        obj.insert("_meta".to_string(), meta);
    }
    params
}
