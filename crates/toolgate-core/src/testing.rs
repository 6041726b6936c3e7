//! In-memory transport fakes for tests.
//!
//! `FakeConnector` hands out `FakeClient`s for scripted servers and keeps
//! counters so tests can assert how many transports were built and how
//! many are still open.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::{
    PromptDescriptor, ResourceContents, ResourceDescriptor, ServerConfig, ToolCallResult,
    ToolDescriptor, TransportKind,
};
use crate::ports::{McpClient, McpConnector, TransportError};

/// Scripted behaviour of one fake server.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    pub tools: Vec<ToolDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
    pub fail_connect: Option<String>,
    pub fail_list: bool,
    pub fail_calls: bool,
    pub fail_close: bool,
    pub connect_delay: Option<Duration>,
}

impl FakeServer {
    pub fn with_tools(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_connect(reason: impl Into<String>) -> Self {
        Self {
            fail_connect: Some(reason.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    #[must_use]
    pub const fn fail_calls(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    #[must_use]
    pub const fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    #[must_use]
    pub const fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }
}

/// A tool call observed by a fake client.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub server_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub meta: Option<Value>,
}

/// Connector that builds in-memory clients.
pub struct FakeConnector {
    servers: Mutex<HashMap<String, FakeServer>>,
    connect_calls: AtomicUsize,
    live_clients: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    can_spawn: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            connect_calls: AtomicUsize::new(0),
            live_clients: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            can_spawn: true,
        }
    }

    /// A connector for a host that cannot spawn processes.
    pub fn sandboxed() -> Self {
        Self {
            can_spawn: false,
            ..Self::new()
        }
    }

    /// Script the behaviour of the server with the given id.
    pub async fn add_server(&self, server_id: impl Into<String>, server: FakeServer) {
        self.servers.lock().await.insert(server_id.into(), server);
    }

    /// Number of times `connect` was invoked.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of clients built and not yet closed.
    pub fn live_clients(&self) -> usize {
        self.live_clients.load(Ordering::SeqCst)
    }

    /// Every tool call seen so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    fn supports(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Stdio => self.can_spawn,
            TransportKind::StreamableHttp => true,
        }
    }

    async fn connect(&self, config: &ServerConfig) -> Result<Box<dyn McpClient>, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let server = self
            .servers
            .lock()
            .await
            .get(&config.id)
            .cloned()
            .ok_or_else(|| TransportError::Spawn(format!("no fake server '{}'", config.id)))?;

        if let Some(delay) = server.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &server.fail_connect {
            return Err(TransportError::Spawn(reason.clone()));
        }

        self.live_clients.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClient {
            server_id: config.id.clone(),
            server,
            calls: Arc::clone(&self.calls),
            live_clients: Arc::clone(&self.live_clients),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Client returned by [`FakeConnector`].
pub struct FakeClient {
    server_id: String,
    server: FakeServer,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    live_clients: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl FakeClient {
    fn list_failure(&self) -> TransportError {
        TransportError::Protocol(format!("listing failed on {}", self.server_id))
    }
}

#[async_trait]
impl McpClient for FakeClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        if self.server.fail_list {
            return Err(self.list_failure());
        }
        Ok(self.server.tools.clone())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, TransportError> {
        if self.server.fail_list {
            return Err(self.list_failure());
        }
        Ok(self.server.resources.clone())
    }

    async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, TransportError> {
        if self.server.fail_list {
            return Err(self.list_failure());
        }
        Ok(self.server.prompts.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        meta: Option<Value>,
    ) -> Result<ToolCallResult, TransportError> {
        self.calls.lock().await.push(RecordedCall {
            server_id: self.server_id.clone(),
            tool_name: name.to_string(),
            arguments,
            meta,
        });
        if self.server.fail_calls {
            return Err(TransportError::Rpc {
                code: -32000,
                message: format!("{name} failed"),
            });
        }
        Ok(ToolCallResult::text(format!("{name} ok")))
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents, TransportError> {
        Ok(ResourceContents {
            contents: vec![serde_json::json!({ "uri": uri, "text": "contents" })],
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.live_clients.fetch_sub(1, Ordering::SeqCst);
        }
        if self.server.fail_close {
            return Err(TransportError::Io(std::io::Error::other("close failed")));
        }
        Ok(())
    }
}

/// Tool descriptor with an empty object schema.
pub fn tool(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, format!("{name} tool"), serde_json::json!({ "type": "object" }))
}

/// Tool descriptor declaring explicit credential requirements.
pub fn gated_tool(name: &str, required: &[&str]) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        format!("{name} tool"),
        serde_json::json!({
            "type": "object",
            "credentials": { "required": required }
        }),
    )
}
