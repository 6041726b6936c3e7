//! Transport-independent MCP client.
//!
//! `PeerClient` speaks the MCP request/response contract over any
//! [`RpcTransport`]. The stdio and streamable HTTP transports only move
//! JSON-RPC messages; everything protocol-level lives here.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use toolgate_core::{
    McpClient, PromptDescriptor, ResourceContents, ResourceDescriptor, ToolCallResult,
    ToolDescriptor, TransportError,
};
use tracing::{debug, warn};

use super::protocol::{
    InitializeResult, METHOD_NOT_FOUND, PeerCapabilities, call_tool_params, initialize_params,
};

/// Upper bound on pages fetched for one listing.
const MAX_LIST_PAGES: usize = 100;

/// Moves JSON-RPC messages to and from one server.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send a request and wait for its response's `result`.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError>;

    /// Send a notification.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError>;

    /// Record the protocol version negotiated during `initialize`.
    fn set_protocol_version(&self, _version: &str) {}

    /// Release the transport.
    async fn close(&self) -> Result<(), TransportError>;
}

/// An initialized MCP session over some transport.
pub struct PeerClient<T> {
    transport: T,
    server_id: String,
    capabilities: PeerCapabilities,
}

impl<T: RpcTransport> PeerClient<T> {
    /// Perform the `initialize` handshake.
    ///
    /// The transport is closed if the handshake fails.
    pub async fn initialize(server_id: &str, transport: T) -> Result<Self, TransportError> {
        let init = match Self::handshake(&transport).await {
            Ok(init) => init,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    debug!(server_id = %server_id, error = %close_err, "Close after failed handshake");
                }
                return Err(e);
            }
        };

        debug!(
            server_id = %server_id,
            protocol_version = %init.protocol_version,
            server_name = init.server_info.as_ref().map_or("", |i| i.name.as_str()),
            "MCP session initialized"
        );

        Ok(Self {
            transport,
            server_id: server_id.to_string(),
            capabilities: init.capabilities,
        })
    }

    async fn handshake(transport: &T) -> Result<InitializeResult, TransportError> {
        let result = transport
            .request("initialize", Some(initialize_params()))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        transport.set_protocol_version(&init.protocol_version);
        transport.notify("notifications/initialized", None).await?;
        Ok(init)
    }

    /// Fetch every page of a `*/list` method.
    ///
    /// A server that does not implement the method yields an empty list.
    async fn list_paged<D: DeserializeOwned>(
        &self,
        method: &str,
        key: &str,
    ) -> Result<Vec<D>, TransportError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let mut result = match self.transport.request(method, params).await {
                Ok(result) => result,
                Err(TransportError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => {
                    return Ok(items);
                }
                Err(e) => return Err(e),
            };

            let page = result.get_mut(key).map(Value::take).unwrap_or(json!([]));
            let page: Vec<D> = serde_json::from_value(page)?;
            items.extend(page);

            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => cursor = Some(next.to_string()),
                _ => return Ok(items),
            }
        }

        warn!(server_id = %self.server_id, method, "Listing exceeded page limit; truncating");
        Ok(items)
    }
}

#[async_trait]
impl<T: RpcTransport> McpClient for PeerClient<T> {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        if self.capabilities.tools.is_none() {
            return Ok(Vec::new());
        }
        self.list_paged("tools/list", "tools").await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, TransportError> {
        if self.capabilities.resources.is_none() {
            return Ok(Vec::new());
        }
        self.list_paged("resources/list", "resources").await
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, TransportError> {
        if self.capabilities.prompts.is_none() {
            return Ok(Vec::new());
        }
        self.list_paged("prompts/list", "prompts").await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        meta: Option<Value>,
    ) -> Result<ToolCallResult, TransportError> {
        let result = self
            .transport
            .request("tools/call", Some(call_tool_params(name, arguments, meta)))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents, TransportError> {
        let result = self
            .transport
            .request("resources/read", Some(json!({ "uri": uri })))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.transport.close().await
    }
}
