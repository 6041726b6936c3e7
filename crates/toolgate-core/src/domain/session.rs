//! Session domain types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::server::ServerId;

/// Opaque session identifier handed to callers at creation.
pub type SessionId = String;

/// Plaintext credential values keyed by requirement id.
pub type CredentialMap = BTreeMap<String, String>;

/// Key of a stored credential blob: one entry per (tool, server).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialKey {
    pub tool_name: String,
    pub server_id: ServerId,
}

impl CredentialKey {
    pub fn new(tool_name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            server_id: server_id.into(),
        }
    }
}

/// Encrypted credential payload: `nonce ‖ tag ‖ ciphertext`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Never print blob bytes.
impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedBlob({} bytes)", self.0.len())
    }
}

/// Per-conversation state held by the session store.
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub model_api_key: Option<String>,
    pub credentials: HashMap<CredentialKey, EncryptedBlob>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session with no credentials.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            model_api_key: None,
            credentials: HashMap::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Whether the session has been idle for longer than `timeout`.
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_active_at > timeout
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("has_model_api_key", &self.model_api_key.is_some())
            .field("credential_count", &self.credentials.len())
            .field("created_at", &self.created_at)
            .field("last_active_at", &self.last_active_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_idle_boundary() {
        let now = Utc::now();
        let session = Session::new("s1", now);
        let timeout = chrono::Duration::hours(24);
        assert!(!session.is_idle(now + chrono::Duration::hours(23), timeout));
        assert!(session.is_idle(now + chrono::Duration::hours(25), timeout));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut session = Session::new("s1", Utc::now());
        session.model_api_key = Some("sk-secret".to_string());
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("has_model_api_key: true"));
    }
}
