//! CLI bootstrap - the composition root.
//!
//! This module is the only place where concrete implementations are wired
//! together:
//! - Credential vault and session store (via toolgate-session)
//! - Session sweeper on a cancellation token
//! - MCP connector, connection manager, registry and orchestrator (via
//!   toolgate-mcp)
//!
//! Command handlers receive the composed [`CliContext`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toolgate_core::{ConnectionEvent, CredentialSource, EventBroadcaster, ServerConfig, Settings};
use toolgate_mcp::{CapabilityRegistry, ConnectionManager, DefaultConnector, Orchestrator};
use toolgate_session::{CredentialVault, EncryptionKey, SessionSweeper, SessionStore};
use tracing::{debug, info, warn};

use crate::config::ServersFile;
use crate::error::CliError;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub settings: Settings,
    pub servers: Vec<ServerConfig>,
}

impl CliConfig {
    pub fn from_servers_file(file: ServersFile) -> Self {
        Self {
            settings: file.settings,
            servers: file.servers,
        }
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionStore>,
    pub events: EventBroadcaster,
    cancel: CancellationToken,
    background: Vec<JoinHandle<()>>,
}

impl CliContext {
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Stop background tasks, close every connection and drop sessions.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.background {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        self.orchestrator.shutdown().await;
        self.sessions.clear().await;
        debug!("Shutdown complete");
    }
}

/// Bootstrap the CLI application.
///
/// The encryption key is read from the environment and is required. Servers
/// that fail to connect are logged and skipped.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let key = EncryptionKey::from_env()?;
    bootstrap_with_key(config, &key).await
}

/// Bootstrap with explicit key material.
pub async fn bootstrap_with_key(
    config: CliConfig,
    key: &EncryptionKey,
) -> Result<CliContext, CliError> {
    toolgate_core::validate_settings(&config.settings)?;
    let settings = config.settings;

    let vault = Arc::new(CredentialVault::new(key));
    let sessions = Arc::new(SessionStore::new(
        vault,
        settings.effective_session_idle_timeout(),
    ));

    let cancel = CancellationToken::new();
    let sweeper = SessionSweeper::new(
        Arc::clone(&sessions),
        settings.effective_sweep_interval(),
        cancel.clone(),
    )
    .spawn();

    let events = EventBroadcaster::new();
    let event_log = spawn_event_log(&events, cancel.clone());

    let manager = Arc::new(ConnectionManager::new(
        Arc::new(DefaultConnector::from_settings(&settings)),
        Arc::new(events.clone()),
        settings.effective_max_concurrent_connects(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        manager,
        Arc::new(CapabilityRegistry::new()),
        Arc::clone(&sessions) as Arc<dyn CredentialSource>,
    ));

    let total = config.servers.len();
    let mut connected = 0;
    for server in config.servers {
        let name = server.name.clone();
        match orchestrator.connect_server(server).await {
            Ok(_) => connected += 1,
            Err(e) => warn!(server_name = %name, error = %e, "Skipping server"),
        }
    }
    info!(connected, total, "Servers ready");

    Ok(CliContext {
        orchestrator,
        sessions,
        events,
        cancel,
        background: vec![sweeper, event_log],
    })
}

/// Mirror connection events into the debug log until cancelled.
fn spawn_event_log(events: &EventBroadcaster, cancel: CancellationToken) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(ConnectionEvent::ConnectFailed { error }) => {
                        debug!(server_name = %error.server_name, category = ?error.category, "Connect failed");
                    }
                    Some(event) => debug!(?event, "Connection event"),
                    None => break,
                },
            }
        }
    })
}
