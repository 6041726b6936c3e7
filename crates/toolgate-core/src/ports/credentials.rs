//! Credential lookup port used by the orchestrator's gated execute path.

use async_trait::async_trait;

use crate::domain::CredentialMap;

/// Read access to per-session stored credentials.
///
/// Implemented by the session store. Reads count as session activity.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Whether the session exists (and refresh its activity timestamp).
    async fn session_exists(&self, session_id: &str) -> bool;

    /// Decrypted credentials stored for (tool, server), or `None` when absent
    /// or undecryptable.
    async fn credentials_for(
        &self,
        session_id: &str,
        tool_name: &str,
        server_id: &str,
    ) -> Option<CredentialMap>;
}
