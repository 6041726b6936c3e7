//! Session state and credentials at rest for toolgate.
//!
//! - [`vault`] - AES-256-GCM encryption of credential blobs
//! - [`store`] - per-session model API key and encrypted credentials
//! - [`sweeper`] - background eviction of idle sessions
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod store;
pub mod sweeper;
pub mod vault;

pub use store::SessionStore;
pub use sweeper::SessionSweeper;
pub use vault::{CredentialVault, ENCRYPTION_KEY_ENV, EncryptionKey, VaultError};
