//! Domain types shared by every toolgate crate.
//!
//! These are pure data types with no infrastructure dependencies.

mod capability;
mod server;
mod session;

pub use capability::{
    CapabilityDescriptor, CredentialRequirement, GatedCapability, PromptArgument,
    PromptDescriptor, ResourceContents, ResourceDescriptor, ServerCapabilities, ToolCallResult,
    ToolDescriptor,
};
pub use server::{ConnectionStatus, ServerConfig, ServerId, TransportConfig, TransportKind};
pub use session::{CredentialKey, CredentialMap, EncryptedBlob, Session, SessionId};

/// Generate a fresh opaque identifier (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
