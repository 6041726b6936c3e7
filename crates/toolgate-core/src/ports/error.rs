//! Error types for connection, invocation and orchestration.
//!
//! Each boundary gets its own enum so callers can match on exactly the
//! failure modes that boundary can produce. Transport errors are opaque
//! to the core: they are wrapped with context, never inspected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ServerId, SessionId, TransportKind};

/// Failure reported by a transport client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to spawn server process: {0}")]
    Spawn(String),

    #[error("Failed to communicate with server: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server returned error: code={code}, message={message}")]
    Rpc { code: i64, message: String },

    #[error("Timeout waiting for server response")]
    Timeout,

    #[error("Connection closed")]
    Closed,
}

/// Errors from registering or connecting a server.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Unknown server: {0}")]
    UnknownServer(ServerId),

    #[error("Server already registered: {0}")]
    AlreadyRegistered(ServerId),

    #[error("Server is disabled: {0}")]
    Disabled(ServerId),

    #[error("Invalid configuration for server {server_id}: {reason}")]
    InvalidConfig { server_id: ServerId, reason: String },

    #[error("Transport '{transport}' is not supported in this environment (server {server_id})")]
    UnsupportedTransport {
        server_id: ServerId,
        transport: TransportKind,
    },

    #[error("Failed to connect to server {server_id}: {source}")]
    Transport {
        server_id: ServerId,
        #[source]
        source: TransportError,
    },
}

impl ConnectError {
    /// Category used when reporting this error in events.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownServer(_)
            | Self::AlreadyRegistered(_)
            | Self::Disabled(_)
            | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::UnsupportedTransport { .. } => ErrorCategory::Environment,
            Self::Transport { source, .. } => match source {
                TransportError::Rpc { .. } | TransportError::Protocol(_) | TransportError::Json(_) => {
                    ErrorCategory::Protocol
                }
                _ => ErrorCategory::Transport,
            },
        }
    }
}

/// Errors from invoking a tool on a specific server.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Server not connected: {0}")]
    NotConnected(ServerId),

    #[error("Call to server {server_id} failed: {source}")]
    Remote {
        server_id: ServerId,
        #[source]
        source: TransportError,
    },
}

/// Errors from the orchestrator's execute paths.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Unknown capability: {0}")]
    NotFound(String),

    #[error("Capability '{capability}' is unavailable: server {server_id} is not connected")]
    NotConnected {
        capability: String,
        server_id: ServerId,
    },

    #[error("Unknown session: {0}")]
    SessionNotFound(SessionId),

    #[error("Capability '{capability}' is missing credentials: {}", .requirement_ids.join(", "))]
    MissingCredentials {
        capability: String,
        requirement_ids: Vec<String>,
    },

    #[error("Capability '{capability}' on server {server_id} failed: {source}")]
    Invoke {
        capability: String,
        server_id: ServerId,
        #[source]
        source: TransportError,
    },
}

impl ExecError {
    /// Wrap an invocation failure with the capability it was routed for.
    pub fn from_invoke(capability: &str, error: InvokeError) -> Self {
        match error {
            InvokeError::NotConnected(server_id) => Self::NotConnected {
                capability: capability.to_string(),
                server_id,
            },
            InvokeError::Remote { server_id, source } => Self::Invoke {
                capability: capability.to_string(),
                server_id,
                source,
            },
        }
    }

    /// Message re-submitted to the model in place of a tool result.
    pub fn to_model_text(&self) -> String {
        format!("Error: {self}")
    }
}

/// User-safe error information for connection events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    pub server_name: String,
    pub message: String,
    pub category: ErrorCategory,
}

impl ErrorInfo {
    pub fn from_connect_error(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
        error: &ConnectError,
    ) -> Self {
        Self {
            server_id: Some(server_id.into()),
            server_name: server_name.into(),
            message: error.to_string(),
            category: error.category(),
        }
    }
}

/// Categories of connection errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Process spawn, network or I/O failure.
    Transport,
    /// JSON-RPC or handshake failure.
    Protocol,
    /// Invalid or unknown configuration.
    Configuration,
    /// Transport not available in the current host environment.
    Environment,
}
