//! Core domain types, ports and events for toolgate.
//!
//! `toolgate` connects a chat application to many MCP servers and exposes
//! an aggregated, credential-gated tool catalog to a conversation loop.
//! This crate holds everything the adapters agree on:
//!
//! - [`domain`] - server configs, capability descriptors, sessions
//! - [`ports`] - transport client, connector, credential and event traits
//! - [`events`] - connection lifecycle events and the broadcaster
//! - [`settings`] - runtime settings and validation
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use domain::{
    CapabilityDescriptor, ConnectionStatus, CredentialKey, CredentialMap, CredentialRequirement,
    EncryptedBlob, GatedCapability, PromptArgument, PromptDescriptor, ResourceContents,
    ResourceDescriptor, ServerCapabilities, ServerConfig, ServerId, Session, SessionId,
    ToolCallResult, ToolDescriptor, TransportConfig, TransportKind, generate_id,
};
pub use events::{ConnectionEvent, EventBroadcaster, EventReceiver, ServerSummary};
pub use ports::{
    AppEventEmitter, ConnectError, CredentialSource, ErrorCategory, ErrorInfo, ExecError,
    InvokeError, McpClient, McpConnector, NoopEmitter, TransportError,
};
pub use settings::{HostEnvironment, Settings, SettingsError, validate_settings};
