//! Aggregated capability catalog.
//!
//! Entries are keyed by capability name and keep registration order. Each
//! entry records the id of the server that owns it; calls are routed
//! through the [`ConnectionManager`](crate::ConnectionManager), which stays
//! the only owner of live connections.

use std::sync::Arc;

use tokio::sync::RwLock;
use toolgate_core::{CapabilityDescriptor, GatedCapability, ServerCapabilities, ToolDescriptor};
use tracing::{debug, warn};

use crate::policy::{DefaultRequirementPolicy, RequirementPolicy};

pub struct CapabilityRegistry {
    entries: RwLock<Vec<CapabilityDescriptor>>,
    policy: Arc<dyn RequirementPolicy>,
}

impl CapabilityRegistry {
    /// Registry using [`DefaultRequirementPolicy`].
    pub fn new() -> Self {
        Self::with_policy(Arc::new(DefaultRequirementPolicy))
    }

    pub fn with_policy(policy: Arc<dyn RequirementPolicy>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            policy,
        }
    }

    /// Add one server's tools to the catalog.
    ///
    /// A capability whose name is already present is replaced and moves to
    /// the end of the catalog. Returns the number of entries written.
    pub async fn register(
        &self,
        server_id: &str,
        server_name: &str,
        rating: f64,
        tools: &[ToolDescriptor],
    ) -> usize {
        let descriptors: Vec<CapabilityDescriptor> = tools
            .iter()
            .map(|tool| CapabilityDescriptor {
                name: tool.name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                input_schema: tool.input_schema.clone(),
                server_id: server_id.to_string(),
                server_name: server_name.to_string(),
                rating,
                credential_requirements: self.policy.requirements_for(tool),
            })
            .collect();

        let count = descriptors.len();
        let mut entries = self.entries.write().await;
        for descriptor in descriptors {
            if let Some(pos) = entries.iter().position(|e| e.name == descriptor.name) {
                let previous = entries.remove(pos);
                if previous.server_id != descriptor.server_id {
                    warn!(
                        capability = %descriptor.name,
                        previous_server = %previous.server_id,
                        server_id = %descriptor.server_id,
                        "Capability name collision; last registration wins"
                    );
                }
            }
            entries.push(descriptor);
        }
        drop(entries);

        debug!(server_id = %server_id, tool_count = count, "Registered capabilities");
        count
    }

    /// Register the tools of an aggregate listing entry.
    pub async fn register_capabilities(&self, capabilities: &ServerCapabilities) -> usize {
        self.register(
            &capabilities.server_id,
            &capabilities.server_name,
            capabilities.rating,
            &capabilities.tools,
        )
        .await
    }

    pub async fn lookup(&self, name: &str) -> Option<CapabilityDescriptor> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    pub async fn list_all(&self) -> Vec<CapabilityDescriptor> {
        self.entries.read().await.clone()
    }

    pub async fn list_by_server(&self, server_id: &str) -> Vec<CapabilityDescriptor> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.server_id == server_id)
            .cloned()
            .collect()
    }

    /// Capabilities that need at least one credential.
    pub async fn list_credential_gated(&self) -> Vec<GatedCapability> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| !e.credential_requirements.is_empty())
            .map(|e| GatedCapability {
                tool_name: e.name.clone(),
                server_name: e.server_name.clone(),
                server_id: e.server_id.clone(),
                credentials: e.credential_requirements.clone(),
            })
            .collect()
    }

    /// Drop every entry owned by `server_id`. Returns how many were removed.
    pub async fn remove_by_server(&self, server_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.server_id != server_id);
        before - entries.len()
    }

    /// Keep only entries whose server passes `keep`.
    pub async fn retain_servers(&self, keep: impl Fn(&str) -> bool + Send) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| keep(&e.server_id));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
