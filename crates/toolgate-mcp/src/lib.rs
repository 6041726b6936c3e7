//! MCP connectivity and tool orchestration for toolgate.
//!
//! - [`client`] - stdio and streamable HTTP clients behind [`DefaultConnector`]
//! - [`manager`] - live connections and their status
//! - [`registry`] - the aggregated capability catalog
//! - [`policy`] - credential requirement derivation
//! - [`orchestrator`] - routing and credential gating for tool calls
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod client;
pub mod manager;
pub mod orchestrator;
pub(crate) mod path;
pub mod policy;
pub mod registry;

pub use client::{DefaultConnector, PROTOCOL_VERSION};
pub use manager::ConnectionManager;
pub use orchestrator::Orchestrator;
pub use policy::{DefaultRequirementPolicy, RequirementPolicy, derive_requirements};
pub use registry::CapabilityRegistry;

// Used only by integration tests
#[cfg(test)]
use toolgate_session as _;
