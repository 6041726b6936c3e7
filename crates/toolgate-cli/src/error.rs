//! CLI-specific error types and exit codes.

use thiserror::Error;
use toolgate_core::{ConnectError, ExecError, SettingsError};
use toolgate_session::VaultError;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A server could not be reached.
    #[error("Connection error: {0}")]
    Connect(String),

    /// A tool call could not be routed or failed remotely.
    #[error("Tool call failed: {0}")]
    Exec(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Connect(_) => 69,  // EX_UNAVAILABLE
            Self::Exec(_) => 1,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<VaultError> for CliError {
    fn from(err: VaultError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ConnectError> for CliError {
    fn from(err: ConnectError) -> Self {
        Self::Connect(err.to_string())
    }
}

impl From<ExecError> for CliError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::NotFound(_) | ExecError::MissingCredentials { .. } => {
                Self::Arguments(err.to_string())
            }
            other => Self::Exec(other.to_string()),
        }
    }
}
