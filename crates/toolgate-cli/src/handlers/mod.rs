//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Parse/validate CLI-specific input, call the orchestrator, format output
//!
//! Routing and gating decisions live in toolgate-mcp, not here.

pub mod call;
pub mod catalog;
pub mod keygen;
pub mod status;
