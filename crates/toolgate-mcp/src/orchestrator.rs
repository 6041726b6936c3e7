//! Call routing and credential gating.
//!
//! The orchestrator ties the connection manager, the capability registry
//! and a session's stored credentials together: it keeps the catalog in
//! sync with live connections and routes each requested call to the server
//! that owns the capability.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use toolgate_core::{
    CapabilityDescriptor, ConnectError, CredentialSource, ExecError, GatedCapability,
    ServerConfig, ServerId, ToolCallResult,
};
use tracing::{debug, info};

use crate::manager::ConnectionManager;
use crate::registry::CapabilityRegistry;

pub struct Orchestrator {
    manager: Arc<ConnectionManager>,
    registry: Arc<CapabilityRegistry>,
    credentials: Arc<dyn CredentialSource>,
}

impl Orchestrator {
    pub fn new(
        manager: Arc<ConnectionManager>,
        registry: Arc<CapabilityRegistry>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            manager,
            registry,
            credentials,
        }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    // =========================================================================
    // Catalog maintenance
    // =========================================================================

    /// Register and connect a server, then add its tools to the catalog.
    pub async fn connect_server(&self, config: ServerConfig) -> Result<ServerId, ConnectError> {
        let server_id = self.manager.register_server(config).await?;
        self.refresh(Some(&server_id)).await;
        Ok(server_id)
    }

    /// Close a server's connection and drop its catalog entries.
    pub async fn disconnect_server(&self, server_id: &str) -> Result<(), ConnectError> {
        self.manager.disconnect(Some(server_id)).await?;
        self.registry.remove_by_server(server_id).await;
        Ok(())
    }

    /// Deregister a server entirely.
    pub async fn remove_server(&self, server_id: &str) -> Result<(), ConnectError> {
        self.manager.deregister_server(server_id).await?;
        self.registry.remove_by_server(server_id).await;
        Ok(())
    }

    /// Rebuild catalog entries from live listings.
    ///
    /// With `None` the whole catalog is rebuilt, so entries of servers that
    /// are no longer connected disappear. Returns the number of entries
    /// registered.
    pub async fn refresh(&self, server_id: Option<&str>) -> usize {
        let listings = self.manager.list_capabilities(server_id).await;

        match server_id {
            Some(id) => {
                self.registry.remove_by_server(id).await;
            }
            None => self.registry.clear().await,
        }

        let mut count = 0;
        for listing in &listings {
            count += self.registry.register_capabilities(listing).await;
        }

        info!(
            server_count = listings.len(),
            capability_count = count,
            "Capability catalog refreshed"
        );
        count
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// The full catalog.
    ///
    /// Requirements are reported, not enforced: a capability the session
    /// has no credentials for is still listed.
    pub async fn discover(&self, session_id: &str) -> Vec<CapabilityDescriptor> {
        let catalog = self.registry.list_all().await;
        debug!(session_id = %session_id, capability_count = catalog.len(), "Discover");
        catalog
    }

    /// Catalog rendered as OpenAI-style function definitions.
    pub async fn tool_definitions(&self) -> Vec<Value> {
        self.registry
            .list_all()
            .await
            .iter()
            .map(CapabilityDescriptor::to_function_definition)
            .collect()
    }

    pub async fn list_credential_gated(&self) -> Vec<GatedCapability> {
        self.registry.list_credential_gated().await
    }

    // =========================================================================
    // Execution
    // =========================================================================

    async fn resolve(&self, name: &str) -> Result<CapabilityDescriptor, ExecError> {
        self.registry
            .lookup(name)
            .await
            .ok_or_else(|| ExecError::NotFound(name.to_string()))
    }

    async fn ensure_connected(&self, capability: &CapabilityDescriptor) -> Result<(), ExecError> {
        if self.manager.is_connected(&capability.server_id).await {
            Ok(())
        } else {
            Err(ExecError::NotConnected {
                capability: capability.name.clone(),
                server_id: capability.server_id.clone(),
            })
        }
    }

    /// Route a call to the capability's server without credential checks.
    pub async fn execute(
        &self,
        session_id: &str,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ExecError> {
        let capability = self.resolve(name).await?;
        self.ensure_connected(&capability).await?;

        debug!(session_id = %session_id, capability = %name, server_id = %capability.server_id, "Execute");
        self.manager
            .invoke(&capability.server_id, name, arguments)
            .await
            .map_err(|e| ExecError::from_invoke(name, e))
    }

    /// Route a call after checking the session holds every required
    /// credential.
    ///
    /// The credentials are sent as `_meta.credentials` on the request;
    /// only the declared ids are forwarded.
    pub async fn execute_gated(
        &self,
        session_id: &str,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ExecError> {
        let capability = self.resolve(name).await?;

        if !self.credentials.session_exists(session_id).await {
            return Err(ExecError::SessionNotFound(session_id.to_string()));
        }

        let meta = self.gather_credentials(session_id, &capability).await?;
        self.ensure_connected(&capability).await?;

        debug!(
            session_id = %session_id,
            capability = %name,
            server_id = %capability.server_id,
            credential_count = capability.credential_requirements.len(),
            "Execute gated"
        );
        self.manager
            .invoke_with_meta(&capability.server_id, name, arguments, meta)
            .await
            .map_err(|e| ExecError::from_invoke(name, e))
    }

    async fn gather_credentials(
        &self,
        session_id: &str,
        capability: &CapabilityDescriptor,
    ) -> Result<Option<Value>, ExecError> {
        if capability.credential_requirements.is_empty() {
            return Ok(None);
        }

        let stored = self
            .credentials
            .credentials_for(session_id, &capability.name, &capability.server_id)
            .await
            .unwrap_or_default();

        let mut supplied = Map::new();
        let mut missing = Vec::new();
        for requirement in &capability.credential_requirements {
            match stored.get(&requirement.id) {
                Some(value) if !value.is_empty() => {
                    supplied.insert(requirement.id.clone(), Value::String(value.clone()));
                }
                _ => missing.push(requirement.id.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(ExecError::MissingCredentials {
                capability: capability.name.clone(),
                requirement_ids: missing,
            });
        }

        Ok(Some(json!({ "credentials": supplied })))
    }

    /// Handle one tool call from the model and produce the text to feed
    /// back into the conversation.
    ///
    /// `arguments` is the raw JSON string the model produced; an empty
    /// string means no arguments. Failures are rendered, never returned.
    pub async fn respond_to_tool_call(&self, session_id: &str, name: &str, arguments: &str) -> String {
        let arguments = if arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(arguments) {
                Ok(value) => value,
                Err(e) => return format!("Error: Invalid arguments for '{name}': {e}"),
            }
        };

        match self.execute_gated(session_id, name, arguments).await {
            Ok(result) => result.to_model_text(),
            Err(e) => e.to_model_text(),
        }
    }

    /// Close every connection and empty the catalog.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
        self.registry.clear().await;
    }
}
