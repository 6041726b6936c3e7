//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define interfaces that the orchestration layer depends on without
//! committing to specific implementations. Adapters in other crates
//! implement these traits.
//!
//! # Design Rules
//!
//! - No transport or crypto types in any signature
//! - Traits are minimal and async where they touch I/O
//! - Errors are domain-specific enums, never `anyhow`

pub mod credentials;
pub mod error;
pub mod event_emitter;
pub mod transport;

pub use credentials::CredentialSource;
pub use error::{
    ConnectError, ErrorCategory, ErrorInfo, ExecError, InvokeError, TransportError,
};
pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use transport::{McpClient, McpConnector};
