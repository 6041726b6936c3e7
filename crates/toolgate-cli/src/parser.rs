//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Default location of the servers file.
pub const DEFAULT_SERVERS_FILE: &str = "toolgate.json";

/// Connect chat tooling to MCP servers behind a credential gate.
#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(about = "Aggregate MCP servers into a credential-gated tool catalog")]
#[command(version)]
pub struct Cli {
    /// JSON file listing the MCP servers to connect
    #[arg(
        long = "servers",
        env = "TOOLGATE_SERVERS",
        default_value = DEFAULT_SERVERS_FILE,
        global = true
    )]
    pub servers: PathBuf,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
