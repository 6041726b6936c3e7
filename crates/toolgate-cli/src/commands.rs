//! Subcommands of the `toolgate` binary.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the configured servers and print the aggregated tool catalog
    Catalog {
        /// Only show tools from this server id
        #[arg(short, long)]
        server: Option<String>,
        /// Print the function definitions handed to the model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect to the configured servers and report their status
    Status,

    /// Call a tool through the credential gate
    Call {
        /// Tool name as shown by `catalog`
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
        /// Credential for the call, as `id=value` (repeatable)
        #[arg(short, long = "credential", value_name = "ID=VALUE")]
        credentials: Vec<String>,
    },

    /// Generate a new base64 encryption key for TOOLGATE_ENCRYPTION_KEY
    Keygen,
}
