//! MCP protocol clients.
//!
//! [`DefaultConnector`] turns a [`ServerConfig`] into an initialized
//! [`McpClient`]: it builds the transport named by the config's
//! [`TransportConfig`] variant and runs the handshake over it.

mod http;
mod peer;
mod protocol;
mod sse;
mod stdio;

use std::time::Duration;

use async_trait::async_trait;
use toolgate_core::{
    HostEnvironment, McpClient, McpConnector, ServerConfig, Settings, TransportConfig,
    TransportError, TransportKind,
};
use tracing::debug;

use self::http::StreamableHttpTransport;
use self::peer::PeerClient;
use self::stdio::{StdioSpawn, StdioTransport};

pub use self::protocol::PROTOCOL_VERSION;

/// Connector for the transports this crate implements.
#[derive(Debug, Clone)]
pub struct DefaultConnector {
    host: HostEnvironment,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl DefaultConnector {
    pub const fn new(
        host: HostEnvironment,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            host,
            request_timeout,
            connect_timeout,
        }
    }

    /// Build a connector from application settings.
    pub const fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.effective_host_environment(),
            settings.effective_request_timeout(),
            settings.effective_connect_timeout(),
        )
    }
}

impl Default for DefaultConnector {
    fn default() -> Self {
        Self::from_settings(&Settings::with_defaults())
    }
}

#[async_trait]
impl McpConnector for DefaultConnector {
    fn supports(&self, kind: TransportKind) -> bool {
        match kind {
            TransportKind::Stdio => self.host.can_spawn_processes(),
            TransportKind::StreamableHttp => true,
        }
    }

    async fn connect(&self, config: &ServerConfig) -> Result<Box<dyn McpClient>, TransportError> {
        debug!(server_id = %config.id, transport = %config.transport.kind(), "Opening transport");

        match &config.transport {
            TransportConfig::Stdio {
                command,
                args,
                env,
                working_dir,
                path_extra,
            } => {
                let spawn = StdioSpawn {
                    command,
                    args,
                    env,
                    working_dir: working_dir.as_deref(),
                    path_extra: path_extra.as_deref(),
                };
                let transport = StdioTransport::spawn(&config.id, &spawn, self.request_timeout)?;
                let client = PeerClient::initialize(&config.id, transport).await?;
                Ok(Box::new(client))
            }
            TransportConfig::StreamableHttp { url, headers } => {
                let transport = StreamableHttpTransport::new(
                    &config.id,
                    url,
                    headers,
                    self.connect_timeout,
                    self.request_timeout,
                )?;
                let client = PeerClient::initialize(&config.id, transport).await?;
                Ok(Box::new(client))
            }
        }
    }
}
