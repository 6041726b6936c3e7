//! Connection lifecycle events.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "status_changed", "serverId": "fs", "status": { "state": "connected" } }
//! ```

mod broadcast;

use serde::{Deserialize, Serialize};

use crate::domain::{ConnectionStatus, ServerId, TransportKind};
use crate::ports::ErrorInfo;

pub use broadcast::{EventBroadcaster, EventReceiver};

/// Summary of a server for event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub id: ServerId,
    pub name: String,
    pub transport: TransportKind,
}

/// Events published by the connection manager.
///
/// Events for one server are delivered in the order the underlying status
/// mutations happened. No ordering is guaranteed across servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// A server config was added to the known set.
    ServerRegistered { server: ServerSummary },

    /// A server config was removed (deregistered or rolled back).
    ServerRemoved {
        #[serde(rename = "serverId")]
        server_id: ServerId,
    },

    /// The connection status of a server changed.
    StatusChanged {
        #[serde(rename = "serverId")]
        server_id: ServerId,
        status: ConnectionStatus,
    },

    /// A connection was established.
    Connected {
        #[serde(rename = "serverId")]
        server_id: ServerId,
        #[serde(rename = "serverName")]
        server_name: String,
        transport: TransportKind,
    },

    /// A connection was closed (cleanly or not).
    Disconnected {
        #[serde(rename = "serverId")]
        server_id: ServerId,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// A connection attempt failed.
    ConnectFailed { error: ErrorInfo },
}

impl ConnectionEvent {
    pub fn server_registered(
        id: impl Into<String>,
        name: impl Into<String>,
        transport: TransportKind,
    ) -> Self {
        Self::ServerRegistered {
            server: ServerSummary {
                id: id.into(),
                name: name.into(),
                transport,
            },
        }
    }

    pub fn server_removed(server_id: impl Into<String>) -> Self {
        Self::ServerRemoved {
            server_id: server_id.into(),
        }
    }

    pub fn status_changed(server_id: impl Into<String>, status: ConnectionStatus) -> Self {
        Self::StatusChanged {
            server_id: server_id.into(),
            status,
        }
    }

    pub fn connected(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
        transport: TransportKind,
    ) -> Self {
        Self::Connected {
            server_id: server_id.into(),
            server_name: server_name.into(),
            transport,
        }
    }

    pub fn disconnected(server_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self::Disconnected {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    pub const fn connect_failed(error: ErrorInfo) -> Self {
        Self::ConnectFailed { error }
    }

    /// Server the event refers to, if any.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::ServerRegistered { server } => Some(&server.id),
            Self::ServerRemoved { server_id }
            | Self::StatusChanged { server_id, .. }
            | Self::Connected { server_id, .. }
            | Self::Disconnected { server_id, .. } => Some(server_id),
            Self::ConnectFailed { error } => error.server_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_changed_wire_format() {
        let event = ConnectionEvent::status_changed("fs", ConnectionStatus::Connected);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["serverId"], "fs");
        assert_eq!(json["status"]["state"], "connected");
    }

    #[test]
    fn test_failed_status_carries_reason() {
        let event = ConnectionEvent::status_changed(
            "fs",
            ConnectionStatus::Failed {
                reason: "spawn failed".to_string(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"]["reason"], "spawn failed");
    }

    #[test]
    fn test_server_id_accessor() {
        assert_eq!(
            ConnectionEvent::server_registered("a", "A", TransportKind::Stdio).server_id(),
            Some("a")
        );
        assert_eq!(ConnectionEvent::disconnected("b", "B").server_id(), Some("b"));
    }
}
