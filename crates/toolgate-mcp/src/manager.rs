//! MCP connection lifecycle management.
//!
//! The manager owns every live client, keyed by server id, and is the only
//! component that opens or closes them. Connects for the same id are
//! serialized by a per-server lock; map locks are never held while a
//! transport call is in flight.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join3;
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use toolgate_core::{
    AppEventEmitter, ConnectError, ConnectionEvent, ConnectionStatus, ErrorInfo, InvokeError,
    McpClient, McpConnector, ResourceContents, ServerCapabilities, ServerConfig, ServerId,
    ToolCallResult, generate_id,
};
use tracing::{debug, info, warn};

pub struct ConnectionManager {
    connector: Arc<dyn McpConnector>,
    emitter: Arc<dyn AppEventEmitter>,
    max_concurrency: usize,
    /// Registered configs in registration order.
    configs: RwLock<Vec<ServerConfig>>,
    connections: RwLock<HashMap<ServerId, Arc<dyn McpClient>>>,
    statuses: RwLock<HashMap<ServerId, ConnectionStatus>>,
    connect_locks: Mutex<HashMap<ServerId, Arc<Mutex<()>>>>,
}

impl ConnectionManager {
    /// Create a manager with injected transport and event sink.
    ///
    /// `max_concurrency` bounds how many servers are connected or queried
    /// at once by the aggregate operations.
    pub fn new(
        connector: Arc<dyn McpConnector>,
        emitter: Arc<dyn AppEventEmitter>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            connector,
            emitter,
            max_concurrency: max_concurrency.max(1),
            configs: RwLock::new(Vec::new()),
            connections: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
            connect_locks: Mutex::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a server and connect to it.
    ///
    /// An empty id is replaced by a generated one. A disabled config is kept
    /// without connecting. If the connect fails the registration is rolled
    /// back and the error returned.
    pub async fn register_server(&self, mut config: ServerConfig) -> Result<ServerId, ConnectError> {
        if config.id.trim().is_empty() {
            config.id = generate_id();
        }
        config
            .validate()
            .map_err(|reason| ConnectError::InvalidConfig {
                server_id: config.id.clone(),
                reason,
            })?;

        let server_id = config.id.clone();
        let enabled = config.enabled;
        let event =
            ConnectionEvent::server_registered(&config.id, &config.name, config.transport.kind());
        {
            let mut configs = self.configs.write().await;
            if configs.iter().any(|c| c.id == server_id) {
                return Err(ConnectError::AlreadyRegistered(server_id));
            }
            configs.push(config);
        }
        self.statuses
            .write()
            .await
            .insert(server_id.clone(), ConnectionStatus::Disconnected);
        self.emitter.emit(event);

        if !enabled {
            debug!(server_id = %server_id, "Registered disabled server");
            return Ok(server_id);
        }

        if let Err(e) = self.connect(&server_id).await {
            self.forget(&server_id).await;
            warn!(server_id = %server_id, error = %e, "Registration rolled back");
            return Err(e);
        }

        Ok(server_id)
    }

    /// Disconnect a server and remove its config.
    pub async fn deregister_server(&self, server_id: &str) -> Result<(), ConnectError> {
        self.disconnect_one(server_id).await?;
        self.forget(server_id).await;
        info!(server_id = %server_id, "Server deregistered");
        Ok(())
    }

    /// Enable or disable a server. Disabling disconnects it.
    pub async fn set_enabled(&self, server_id: &str, enabled: bool) -> Result<(), ConnectError> {
        {
            let mut configs = self.configs.write().await;
            let config = configs
                .iter_mut()
                .find(|c| c.id == server_id)
                .ok_or_else(|| ConnectError::UnknownServer(server_id.to_string()))?;
            config.enabled = enabled;
        }
        if !enabled {
            self.disconnect_one(server_id).await?;
        }
        Ok(())
    }

    async fn forget(&self, server_id: &str) {
        self.configs.write().await.retain(|c| c.id != server_id);
        self.statuses.write().await.remove(server_id);
        self.connect_locks.lock().await.remove(server_id);
        self.emitter.emit(ConnectionEvent::server_removed(server_id));
    }

    // =========================================================================
    // Connect / disconnect
    // =========================================================================

    async fn connect_lock(&self, server_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.connect_locks.lock().await;
        Arc::clone(locks.entry(server_id.to_string()).or_default())
    }

    async fn config(&self, server_id: &str) -> Option<ServerConfig> {
        self.configs
            .read()
            .await
            .iter()
            .find(|c| c.id == server_id)
            .cloned()
    }

    /// Record a status change and publish it, plus an optional follow-up
    /// event, while the status map is held so per-server order is kept.
    async fn transition(
        &self,
        server_id: &str,
        status: ConnectionStatus,
        follow_up: Option<ConnectionEvent>,
    ) {
        let mut statuses = self.statuses.write().await;
        if statuses.get(server_id) == Some(&status) && follow_up.is_none() {
            return;
        }
        statuses.insert(server_id.to_string(), status.clone());
        self.emitter
            .emit(ConnectionEvent::status_changed(server_id, status));
        if let Some(event) = follow_up {
            self.emitter.emit(event);
        }
    }

    /// Connect to a registered server. A connected server is left as is.
    pub async fn connect(&self, server_id: &str) -> Result<(), ConnectError> {
        let lock = self.connect_lock(server_id).await;
        let _guard = lock.lock().await;

        if self.connections.read().await.contains_key(server_id) {
            debug!(server_id = %server_id, "Already connected");
            return Ok(());
        }

        let config = self
            .config(server_id)
            .await
            .ok_or_else(|| ConnectError::UnknownServer(server_id.to_string()))?;
        if !config.enabled {
            return Err(ConnectError::Disabled(config.id));
        }

        let kind = config.transport.kind();
        if !self.connector.supports(kind) {
            let error = ConnectError::UnsupportedTransport {
                server_id: config.id.clone(),
                transport: kind,
            };
            self.record_failure(&config, &error).await;
            return Err(error);
        }

        self.transition(server_id, ConnectionStatus::Connecting, None)
            .await;

        match self.connector.connect(&config).await {
            Ok(client) => {
                self.connections
                    .write()
                    .await
                    .insert(config.id.clone(), Arc::from(client));
                self.transition(
                    server_id,
                    ConnectionStatus::Connected,
                    Some(ConnectionEvent::connected(&config.id, &config.name, kind)),
                )
                .await;
                info!(server_id = %config.id, server_name = %config.name, transport = %kind, "MCP server connected");
                Ok(())
            }
            Err(source) => {
                let error = ConnectError::Transport {
                    server_id: config.id.clone(),
                    source,
                };
                self.record_failure(&config, &error).await;
                Err(error)
            }
        }
    }

    async fn record_failure(&self, config: &ServerConfig, error: &ConnectError) {
        warn!(server_id = %config.id, server_name = %config.name, error = %error, "MCP connect failed");
        self.transition(
            &config.id,
            ConnectionStatus::Failed {
                reason: error.to_string(),
            },
            Some(ConnectionEvent::connect_failed(ErrorInfo::from_connect_error(
                &config.id,
                &config.name,
                error,
            ))),
        )
        .await;
    }

    /// Connect every enabled server, at most `max_concurrency` at a time.
    ///
    /// Results are in registration order.
    pub async fn connect_all(&self) -> Vec<(ServerId, Result<(), ConnectError>)> {
        let ids: Vec<ServerId> = self
            .configs
            .read()
            .await
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.id.clone())
            .collect();

        stream::iter(ids)
            .map(|id| async move {
                let result = self.connect(&id).await;
                (id, result)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    /// Close one server's connection, or every connection when `server_id`
    /// is `None`.
    ///
    /// Close errors are logged; the connection is always dropped and the
    /// status reset to `Disconnected`.
    pub async fn disconnect(&self, server_id: Option<&str>) -> Result<(), ConnectError> {
        match server_id {
            Some(id) => self.disconnect_one(id).await,
            None => {
                let ids: Vec<ServerId> =
                    self.configs.read().await.iter().map(|c| c.id.clone()).collect();
                for id in ids {
                    // A concurrent deregister is the only way this can fail.
                    if let Err(e) = self.disconnect_one(&id).await {
                        debug!(server_id = %id, error = %e, "Skipped during disconnect");
                    }
                }
                Ok(())
            }
        }
    }

    async fn disconnect_one(&self, server_id: &str) -> Result<(), ConnectError> {
        let lock = self.connect_lock(server_id).await;
        let _guard = lock.lock().await;

        let config = self
            .config(server_id)
            .await
            .ok_or_else(|| ConnectError::UnknownServer(server_id.to_string()))?;

        let client = self.connections.write().await.remove(server_id);
        let Some(client) = client else {
            self.transition(server_id, ConnectionStatus::Disconnected, None)
                .await;
            return Ok(());
        };

        if let Err(e) = client.close().await {
            warn!(server_id = %server_id, error = %e, "Error closing MCP connection");
        }

        self.transition(
            server_id,
            ConnectionStatus::Disconnected,
            Some(ConnectionEvent::disconnected(server_id, &config.name)),
        )
        .await;
        info!(server_id = %server_id, "MCP server disconnected");
        Ok(())
    }

    /// Disconnect everything.
    pub async fn shutdown(&self) {
        // Only fails for unknown ids, which `None` never produces.
        let _ = self.disconnect(None).await;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Query one or all connected servers for their tools, resources and
    /// prompts.
    ///
    /// Servers are queried concurrently; a listing that fails on one server
    /// comes back empty for that server only. Results follow registration
    /// order.
    pub async fn list_capabilities(&self, server_id: Option<&str>) -> Vec<ServerCapabilities> {
        let targets: Vec<(ServerConfig, Arc<dyn McpClient>)> = {
            let configs = self.configs.read().await;
            let connections = self.connections.read().await;
            configs
                .iter()
                .filter(|c| server_id.is_none_or(|id| c.id == id))
                .filter_map(|c| {
                    connections
                        .get(&c.id)
                        .map(|client| (c.clone(), Arc::clone(client)))
                })
                .collect()
        };

        stream::iter(targets)
            .map(|(config, client)| query_server(config, client))
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    fn no_connection(server_id: &str) -> InvokeError {
        InvokeError::NotConnected(server_id.to_string())
    }

    async fn client(&self, server_id: &str) -> Result<Arc<dyn McpClient>, InvokeError> {
        self.connections
            .read()
            .await
            .get(server_id)
            .cloned()
            .ok_or_else(|| Self::no_connection(server_id))
    }

    /// Call a tool on a connected server.
    ///
    /// Fails with `NotConnected` when there is no live connection; no
    /// connect is attempted.
    pub async fn invoke(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, InvokeError> {
        self.invoke_with_meta(server_id, tool_name, arguments, None)
            .await
    }

    /// Like [`invoke`](Self::invoke), attaching `_meta` to the request.
    pub async fn invoke_with_meta(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Value,
        meta: Option<Value>,
    ) -> Result<ToolCallResult, InvokeError> {
        let client = self.client(server_id).await?;
        debug!(server_id = %server_id, tool = %tool_name, "Invoking tool");
        client
            .call_tool(tool_name, arguments, meta)
            .await
            .map_err(|source| InvokeError::Remote {
                server_id: server_id.to_string(),
                source,
            })
    }

    pub async fn read_resource(
        &self,
        server_id: &str,
        uri: &str,
    ) -> Result<ResourceContents, InvokeError> {
        let client = self.client(server_id).await?;
        client
            .read_resource(uri)
            .await
            .map_err(|source| InvokeError::Remote {
                server_id: server_id.to_string(),
                source,
            })
    }

    /// Snapshot of every registered server's status.
    pub async fn get_status(&self) -> HashMap<ServerId, ConnectionStatus> {
        self.statuses.read().await.clone()
    }

    pub async fn status(&self, server_id: &str) -> Option<ConnectionStatus> {
        self.statuses.read().await.get(server_id).cloned()
    }

    /// Snapshot of registered configs in registration order.
    pub async fn get_configs(&self) -> Vec<ServerConfig> {
        self.configs.read().await.clone()
    }

    pub async fn get_config(&self, server_id: &str) -> Option<ServerConfig> {
        self.config(server_id).await
    }

    pub async fn is_connected(&self, server_id: &str) -> bool {
        self.connections.read().await.contains_key(server_id)
    }
}

async fn query_server(config: ServerConfig, client: Arc<dyn McpClient>) -> ServerCapabilities {
    let (tools, resources, prompts) =
        join3(client.list_tools(), client.list_resources(), client.list_prompts()).await;

    let mut capabilities = ServerCapabilities::empty(&config.id, &config.name, config.rating);
    match tools {
        Ok(tools) => capabilities.tools = tools,
        Err(e) => warn!(server_id = %config.id, error = %e, "Failed to list tools"),
    }
    match resources {
        Ok(resources) => capabilities.resources = resources,
        Err(e) => warn!(server_id = %config.id, error = %e, "Failed to list resources"),
    }
    match prompts {
        Ok(prompts) => capabilities.prompts = prompts,
        Err(e) => warn!(server_id = %config.id, error = %e, "Failed to list prompts"),
    }

    debug!(
        server_id = %config.id,
        tool_count = capabilities.tools.len(),
        resource_count = capabilities.resources.len(),
        prompt_count = capabilities.prompts.len(),
        "Listed server capabilities"
    );
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::NoopEmitter;
    use toolgate_core::testing::{FakeConnector, FakeServer, tool};

    async fn manager_with(servers: Vec<(&str, FakeServer)>) -> (ConnectionManager, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::new());
        for (id, server) in servers {
            connector.add_server(id, server).await;
        }
        let manager = ConnectionManager::new(
            Arc::clone(&connector) as Arc<dyn McpConnector>,
            Arc::new(NoopEmitter::new()),
            4,
        );
        (manager, connector)
    }

    #[tokio::test]
    async fn test_unknown_server_status() {
        let (manager, _) = manager_with(vec![]).await;
        assert!(manager.status("missing").await.is_none());
        assert!(matches!(
            manager.connect("missing").await,
            Err(ConnectError::UnknownServer(_))
        ));
    }

    #[tokio::test]
    async fn test_register_connects() {
        let (manager, connector) =
            manager_with(vec![("a", FakeServer::with_tools(vec![tool("x")]))]).await;
        let id = manager
            .register_server(ServerConfig::stdio("a", "Alpha", "alpha", vec![]))
            .await
            .unwrap();
        assert_eq!(id, "a");
        assert!(manager.is_connected("a").await);
        assert_eq!(manager.status("a").await, Some(ConnectionStatus::Connected));
        assert_eq!(connector.live_clients(), 1);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (manager, connector) = manager_with(vec![("a", FakeServer::default())]).await;
        manager
            .register_server(ServerConfig::stdio("a", "Alpha", "alpha", vec![]))
            .await
            .unwrap();
        manager.connect("a").await.unwrap();
        assert_eq!(connector.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_generated() {
        let connector = Arc::new(FakeConnector::new());
        let manager = ConnectionManager::new(connector, Arc::new(NoopEmitter::new()), 1);
        let mut config = ServerConfig::stdio("", "Anon", "anon", vec![]);
        config.enabled = false;
        let id = manager.register_server(config).await.unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(manager.get_configs().await[0].id, id);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (manager, _) = manager_with(vec![("a", FakeServer::default())]).await;
        let config = ServerConfig::stdio("a", "Alpha", "alpha", vec![]);
        manager.register_server(config.clone()).await.unwrap();
        assert!(matches!(
            manager.register_server(config).await,
            Err(ConnectError::AlreadyRegistered(id)) if id == "a"
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (manager, connector) = manager_with(vec![]).await;
        let config = ServerConfig::streamable_http("h", "Remote", "ftp://example.com");
        assert!(matches!(
            manager.register_server(config).await,
            Err(ConnectError::InvalidConfig { .. })
        ));
        assert_eq!(connector.connect_calls(), 0);
        assert!(manager.get_configs().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_server_is_kept_without_connecting() {
        let (manager, connector) = manager_with(vec![("a", FakeServer::default())]).await;
        let mut config = ServerConfig::stdio("a", "Alpha", "alpha", vec![]);
        config.enabled = false;
        manager.register_server(config).await.unwrap();

        assert_eq!(connector.connect_calls(), 0);
        assert!(matches!(
            manager.connect("a").await,
            Err(ConnectError::Disabled(_))
        ));

        manager.set_enabled("a", true).await.unwrap();
        assert!(!manager.is_connected("a").await);
        manager.connect("a").await.unwrap();
        assert!(manager.is_connected("a").await);
    }

    #[tokio::test]
    async fn test_disable_disconnects() {
        let (manager, connector) = manager_with(vec![("a", FakeServer::default())]).await;
        manager
            .register_server(ServerConfig::stdio("a", "Alpha", "alpha", vec![]))
            .await
            .unwrap();
        manager.set_enabled("a", false).await.unwrap();
        assert!(!manager.is_connected("a").await);
        assert_eq!(connector.live_clients(), 0);
        assert_eq!(
            manager.status("a").await,
            Some(ConnectionStatus::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_deregister_removes_everything() {
        let (manager, connector) = manager_with(vec![("a", FakeServer::default())]).await;
        manager
            .register_server(ServerConfig::stdio("a", "Alpha", "alpha", vec![]))
            .await
            .unwrap();
        manager.deregister_server("a").await.unwrap();
        assert!(manager.get_configs().await.is_empty());
        assert!(manager.status("a").await.is_none());
        assert_eq!(connector.live_clients(), 0);
        assert!(matches!(
            manager.deregister_server("a").await,
            Err(ConnectError::UnknownServer(_))
        ));
    }

    #[tokio::test]
    async fn test_read_resource_routes_to_server() {
        let (manager, _) = manager_with(vec![("a", FakeServer::default())]).await;
        manager
            .register_server(ServerConfig::stdio("a", "Alpha", "alpha", vec![]))
            .await
            .unwrap();
        let contents = manager.read_resource("a", "file:///notes.txt").await.unwrap();
        assert_eq!(contents.contents[0]["uri"], "file:///notes.txt");
        assert!(matches!(
            manager.read_resource("b", "file:///x").await,
            Err(InvokeError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_failure_is_wrapped() {
        let (manager, _) = manager_with(vec![("a", FakeServer::default().fail_calls())]).await;
        manager
            .register_server(ServerConfig::stdio("a", "Alpha", "alpha", vec![]))
            .await
            .unwrap();
        let result = manager.invoke("a", "x", serde_json::json!({})).await;
        assert!(matches!(result, Err(InvokeError::Remote { server_id, .. }) if server_id == "a"));
    }
}
