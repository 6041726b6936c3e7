//! Command-line host for toolgate.
//!
//! Loads a servers file, connects every configured MCP server, and exposes
//! the aggregated catalog and gated tool calls as subcommands. The binary in
//! `main.rs` is a thin dispatcher over the modules here.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use config::ServersFile;
pub use error::CliError;
pub use logging::{init_logging, load_dotenv};
pub use parser::Cli;
