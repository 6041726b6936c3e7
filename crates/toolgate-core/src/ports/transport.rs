//! Transport client port.
//!
//! The connection manager only ever talks to remote servers through these
//! traits. Concrete clients (stdio, streamable HTTP) live in `toolgate-mcp`;
//! tests substitute in-memory fakes.

use async_trait::async_trait;
use serde_json::Value;

use super::error::TransportError;
use crate::domain::{
    PromptDescriptor, ResourceContents, ResourceDescriptor, ServerConfig, ToolCallResult,
    ToolDescriptor, TransportKind,
};

/// An initialized protocol client bound to one server.
///
/// Every method may suspend on process or network I/O and may fail with a
/// transport-specific error. Implementations impose their own timeouts.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// List the tools offered by the server.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError>;

    /// List the resources offered by the server.
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, TransportError>;

    /// List the prompts offered by the server.
    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, TransportError>;

    /// Invoke a tool.
    ///
    /// `meta` is sent as the request's `_meta` field when present.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        meta: Option<Value>,
    ) -> Result<ToolCallResult, TransportError>;

    /// Read a resource by URI.
    async fn read_resource(&self, uri: &str) -> Result<ResourceContents, TransportError>;

    /// Close the connection and release the underlying transport.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds a transport from a server config and opens a client over it.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Whether this connector can build the given transport kind in the
    /// current host environment.
    fn supports(&self, kind: TransportKind) -> bool;

    /// Build the transport, perform the protocol handshake and return the
    /// initialized client.
    async fn connect(&self, config: &ServerConfig) -> Result<Box<dyn McpClient>, TransportError>;
}
