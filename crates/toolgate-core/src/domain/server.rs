//! Remote capability server configuration and connection status.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a registered server.
pub type ServerId = String;

/// How to reach a remote capability server.
///
/// Adding a variant forces every connector to handle it: transports are
/// always built by exhaustive `match`, never by string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Spawn a local process and speak JSON-RPC over its stdin/stdout.
    Stdio {
        /// Executable name (resolved via PATH) or absolute path.
        command: String,
        /// Command-line arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Extra environment variables for the child process.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
        /// Working directory for the child process.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_dir: Option<String>,
        /// Additional PATH entries for the child process.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path_extra: Option<String>,
    },
    /// POST JSON-RPC messages to an HTTP endpoint (streamable HTTP).
    StreamableHttp {
        /// Endpoint URL.
        url: String,
        /// Extra request headers (e.g. `Authorization`).
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    /// Short transport kind label for logs and events.
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio { .. } => TransportKind::Stdio,
            Self::StreamableHttp { .. } => TransportKind::StreamableHttp,
        }
    }
}

/// Transport kind without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Stdio,
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::StreamableHttp => write!(f, "streamable_http"),
        }
    }
}

/// Identity and reachability of one remote capability server.
///
/// Immutable once registered except for `enabled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Caller-assigned id; an empty id is replaced by a generated UUID on
    /// registration.
    #[serde(default)]
    pub id: ServerId,
    /// Human-readable name.
    pub name: String,
    /// Transport used to reach the server.
    pub transport: TransportConfig,
    /// Whether the server should be connected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Catalog rating copied onto every capability of this server.
    #[serde(default)]
    pub rating: f64,
}

const fn default_enabled() -> bool {
    true
}

impl ServerConfig {
    /// Create an enabled config with no rating.
    pub fn new(id: impl Into<String>, name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transport,
            enabled: true,
            rating: 0.0,
        }
    }

    /// Create a stdio server config.
    pub fn stdio(
        id: impl Into<String>,
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self::new(
            id,
            name,
            TransportConfig::Stdio {
                command: command.into(),
                args,
                env: BTreeMap::new(),
                working_dir: None,
                path_extra: None,
            },
        )
    }

    /// Create a streamable HTTP server config.
    pub fn streamable_http(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            name,
            TransportConfig::StreamableHttp {
                url: url.into(),
                headers: BTreeMap::new(),
            },
        )
    }

    /// Set the catalog rating.
    #[must_use]
    pub const fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    /// Validate the configuration for the given transport.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }
        if !self.rating.is_finite() {
            return Err(format!("Rating must be a finite number, got {}", self.rating));
        }
        match &self.transport {
            TransportConfig::Stdio { command, .. } => {
                if command.trim().is_empty() {
                    return Err("Stdio servers require a command".to_string());
                }
            }
            TransportConfig::StreamableHttp { url, .. } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(format!("Streamable HTTP servers require an http(s) URL, got '{url}'"));
                }
            }
        }
        Ok(())
    }
}

/// Status of the connection to one server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed { reason: String },
}

impl ConnectionStatus {
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_deserializes_tagged() {
        let json = r#"{
            "id": "fs",
            "name": "Filesystem",
            "transport": {"type": "stdio", "command": "npx", "args": ["-y", "server-fs"]}
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert!(config.enabled);
        assert!((config.rating - 0.0).abs() < f64::EPSILON);
        assert_eq!(config.transport.kind(), TransportKind::Stdio);
    }

    #[test]
    fn test_http_config_deserializes_headers() {
        let json = r#"{
            "name": "Remote",
            "transport": {
                "type": "streamable_http",
                "url": "https://tools.example.com/mcp",
                "headers": {"Authorization": "Bearer x"}
            },
            "enabled": false,
            "rating": 4.5
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert!(config.id.is_empty());
        assert!(!config.enabled);
        match config.transport {
            TransportConfig::StreamableHttp { headers, .. } => {
                assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer x"));
            }
            TransportConfig::Stdio { .. } => panic!("expected http transport"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let config = ServerConfig::stdio("a", "A", "  ", vec![]);
        assert!(config.validate().unwrap_err().contains("command"));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = ServerConfig::streamable_http("a", "A", "ftp://example.com");
        assert!(config.validate().is_err());
        let config = ServerConfig::streamable_http("a", "A", "https://example.com/mcp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_status_display() {
        let status = ConnectionStatus::Failed {
            reason: "refused".to_string(),
        };
        assert_eq!(status.to_string(), "failed: refused");
        assert!(!status.is_connected());
        assert!(ConnectionStatus::Connected.is_connected());
    }
}
