//! In-memory session store.
//!
//! Sessions hold a model API key and encrypted per-(tool, server)
//! credential blobs. Every read or write through the store refreshes the
//! session's `last_active_at`, so idle sessions age out even under pure
//! read traffic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use toolgate_core::{
    CredentialKey, CredentialMap, CredentialSource, Session, SessionId, generate_id,
};
use tracing::{debug, info, warn};

use crate::vault::{CredentialVault, VaultError};

/// Owned, lifecycle-scoped session store.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
    vault: Arc<CredentialVault>,
    idle_timeout: chrono::Duration,
}

impl SessionStore {
    /// Create a store that expires sessions idle for longer than `idle_timeout`.
    pub fn new(vault: Arc<CredentialVault>, idle_timeout: Duration) -> Self {
        let idle_timeout =
            chrono::Duration::from_std(idle_timeout).unwrap_or(chrono::Duration::MAX);
        Self {
            sessions: RwLock::new(HashMap::new()),
            vault,
            idle_timeout,
        }
    }

    /// Create a fresh session and return its id.
    pub async fn create(&self) -> SessionId {
        let id = generate_id();
        let session = Session::new(id.clone(), Utc::now());
        self.sessions.write().await.insert(id.clone(), session);
        debug!(session_id = %id, "Session created");
        id
    }

    /// Refresh `last_active_at` and return a snapshot of the session.
    pub async fn touch(&self, session_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.last_active_at = Utc::now();
        Some(session.clone())
    }

    /// Encrypt and store credentials for (tool, server).
    ///
    /// Replaces any previous entry for the same key. Unknown sessions are
    /// ignored.
    pub async fn set_credentials(
        &self,
        session_id: &str,
        tool_name: &str,
        server_id: &str,
        credentials: &CredentialMap,
    ) -> Result<(), VaultError> {
        let plaintext =
            serde_json::to_vec(credentials).map_err(|e| VaultError::Malformed(e.to_string()))?;
        let blob = self.vault.encrypt(&plaintext)?;

        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(session_id) else {
            debug!(session_id = %session_id, "Ignoring credentials for unknown session");
            return Ok(());
        };
        session
            .credentials
            .insert(CredentialKey::new(tool_name, server_id), blob);
        session.last_active_at = Utc::now();
        debug!(
            session_id = %session_id,
            tool_name = %tool_name,
            server_id = %server_id,
            credential_count = credentials.len(),
            "Stored credentials"
        );
        Ok(())
    }

    /// Decrypt the credentials stored for (tool, server).
    ///
    /// Any decryption failure is logged and reported as absent.
    pub async fn get_credentials(
        &self,
        session_id: &str,
        tool_name: &str,
        server_id: &str,
    ) -> Option<CredentialMap> {
        let blob = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(session_id)?;
            session.last_active_at = Utc::now();
            session
                .credentials
                .get(&CredentialKey::new(tool_name, server_id))?
                .clone()
        };

        let plaintext = match self.vault.decrypt(&blob) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    tool_name = %tool_name,
                    server_id = %server_id,
                    error = %e,
                    "Discarding undecryptable credentials"
                );
                return None;
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    tool_name = %tool_name,
                    error = %e,
                    "Stored credentials are not a valid credential map"
                );
                None
            }
        }
    }

    /// Set the model API key. Unknown sessions are ignored.
    pub async fn set_model_api_key(&self, session_id: &str, api_key: Option<String>) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.model_api_key = api_key;
            session.last_active_at = Utc::now();
        }
    }

    /// Get the model API key.
    pub async fn get_model_api_key(&self, session_id: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.last_active_at = Utc::now();
        session.model_api_key.clone()
    }

    /// End a session explicitly.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Remove every session idle for longer than the timeout at `now`.
    ///
    /// Returns the number of sessions removed.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_idle(now, self.idle_timeout));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Swept idle sessions");
        }
        removed
    }

    /// Remove every session idle for longer than the timeout.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    /// Drop all sessions (shutdown cleanup).
    pub async fn clear(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        debug!(count, "Cleared sessions");
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    #[cfg(test)]
    async fn backdate(&self, session_id: &str, by: chrono::Duration) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.last_active_at = session.last_active_at - by;
        }
    }

    #[cfg(test)]
    async fn replace_blob(&self, session_id: &str, key: CredentialKey, blob: toolgate_core::EncryptedBlob) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.credentials.insert(key, blob);
        }
    }
}

#[async_trait]
impl CredentialSource for SessionStore {
    async fn session_exists(&self, session_id: &str) -> bool {
        self.touch(session_id).await.is_some()
    }

    async fn credentials_for(
        &self,
        session_id: &str,
        tool_name: &str,
        server_id: &str,
    ) -> Option<CredentialMap> {
        self.get_credentials(session_id, tool_name, server_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::EncryptionKey;
    use toolgate_core::EncryptedBlob;

    fn store() -> SessionStore {
        let vault = Arc::new(CredentialVault::new(&EncryptionKey::generate()));
        SessionStore::new(vault, Duration::from_secs(24 * 60 * 60))
    }

    fn creds(pairs: &[(&str, &str)]) -> CredentialMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_touch() {
        let store = store();
        let id = store.create().await;
        let session = store.touch(&id).await.unwrap();
        assert_eq!(session.id, id);
        assert!(session.credentials.is_empty());
        assert!(session.last_active_at >= session.created_at);
        assert!(store.touch("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_credentials_round_trip() {
        let store = store();
        let id = store.create().await;
        let map = creds(&[("api_key", "sk-1")]);
        store.set_credentials(&id, "search", "a", &map).await.unwrap();
        assert_eq!(store.get_credentials(&id, "search", "a").await, Some(map));
        assert!(store.get_credentials(&id, "search", "b").await.is_none());
    }

    #[tokio::test]
    async fn test_credentials_last_write_wins() {
        let store = store();
        let id = store.create().await;
        store
            .set_credentials(&id, "search", "a", &creds(&[("api_key", "old")]))
            .await
            .unwrap();
        store
            .set_credentials(&id, "search", "a", &creds(&[("api_key", "new")]))
            .await
            .unwrap();

        let session = store.touch(&id).await.unwrap();
        assert_eq!(session.credentials.len(), 1);
        assert_eq!(
            store.get_credentials(&id, "search", "a").await,
            Some(creds(&[("api_key", "new")]))
        );
    }

    #[tokio::test]
    async fn test_set_credentials_on_missing_session_is_noop() {
        let store = store();
        store
            .set_credentials("ghost", "search", "a", &creds(&[("api_key", "x")]))
            .await
            .unwrap();
        assert!(store.is_empty().await);
        assert!(store.get_credentials("ghost", "search", "a").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_blob_reads_as_absent() {
        let store = store();
        let id = store.create().await;
        store
            .set_credentials(&id, "search", "a", &creds(&[("api_key", "x")]))
            .await
            .unwrap();
        store
            .replace_blob(
                &id,
                CredentialKey::new("search", "a"),
                EncryptedBlob::from_bytes(vec![0u8; 40]),
            )
            .await;
        assert!(store.get_credentials(&id, "search", "a").await.is_none());
    }

    #[tokio::test]
    async fn test_model_api_key() {
        let store = store();
        let id = store.create().await;
        assert!(store.get_model_api_key(&id).await.is_none());
        store.set_model_api_key(&id, Some("sk-model".to_string())).await;
        assert_eq!(store.get_model_api_key(&id).await.as_deref(), Some("sk-model"));
        store.set_model_api_key("ghost", Some("x".to_string())).await;
        assert!(store.get_model_api_key("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_keeps_active() {
        let store = store();
        let idle = store.create().await;
        let active = store.create().await;
        store.backdate(&idle, chrono::Duration::hours(25)).await;
        store.backdate(&active, chrono::Duration::hours(23)).await;

        assert_eq!(store.sweep().await, 1);
        assert!(store.touch(&idle).await.is_none());
        assert!(store.touch(&active).await.is_some());
    }

    #[tokio::test]
    async fn test_touch_refreshes_activity() {
        let store = store();
        let id = store.create().await;
        store.backdate(&id, chrono::Duration::hours(23)).await;
        store.touch(&id).await;
        assert_eq!(
            store.sweep_at(Utc::now() + chrono::Duration::hours(2)).await,
            0
        );
    }

    #[tokio::test]
    async fn test_credential_source_impl() {
        let store = store();
        let id = store.create().await;
        store
            .set_credentials(&id, "query", "b", &creds(&[("db_token", "t")]))
            .await
            .unwrap();

        let source: &dyn CredentialSource = &store;
        assert!(source.session_exists(&id).await);
        assert!(!source.session_exists("ghost").await);
        assert_eq!(
            source.credentials_for(&id, "query", "b").await,
            Some(creds(&[("db_token", "t")]))
        );
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let store = store();
        let a = store.create().await;
        store.create().await;
        assert!(store.remove(&a).await);
        assert!(!store.remove(&a).await);
        assert_eq!(store.len().await, 1);
        store.clear().await;
        assert!(store.is_empty().await);
    }
}
