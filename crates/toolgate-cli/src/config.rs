//! Servers file loading.
//!
//! The file is JSON:
//!
//! ```json
//! {
//!   "settings": { "request_timeout_secs": 30 },
//!   "servers": [
//!     { "id": "fs", "name": "Files", "transport": { "type": "stdio", "command": "mcp-fs" } },
//!     { "name": "Search", "transport": { "type": "streamable_http", "url": "https://example.com/mcp" } }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use toolgate_core::{ServerConfig, Settings, validate_settings};

use crate::error::CliError;

/// Parsed servers file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServersFile {
    pub settings: Settings,
    pub servers: Vec<ServerConfig>,
}

impl ServersFile {
    /// Parse and validate a servers file from JSON text.
    pub fn from_json(text: &str) -> Result<Self, CliError> {
        let file: Self = serde_json::from_str(text)
            .map_err(|e| CliError::Config(format!("Invalid servers file: {e}")))?;
        validate_settings(&file.settings)?;
        Ok(file)
    }

    /// Load the servers file at `path`.
    ///
    /// A missing file yields an empty server list with default settings.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No servers file; starting with no servers");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use toolgate_core::TransportConfig;

    #[test]
    fn test_parses_both_transports() {
        let file = ServersFile::from_json(
            r#"{
                "servers": [
                    {"id": "fs", "name": "Files", "transport": {"type": "stdio", "command": "mcp-fs", "args": ["--root", "/tmp"]}},
                    {"name": "Search", "enabled": false, "rating": 4.0,
                     "transport": {"type": "streamable_http", "url": "https://example.com/mcp",
                                   "headers": {"Authorization": "Bearer x"}}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(file.servers.len(), 2);
        assert!(matches!(
            &file.servers[0].transport,
            TransportConfig::Stdio { args, .. } if args.len() == 2
        ));
        assert!(file.servers[0].enabled);
        assert!(file.servers[1].id.is_empty());
        assert!(!file.servers[1].enabled);
        assert_eq!(file.settings, Settings::default());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let result = ServersFile::from_json(r#"{"settings": {"sweep_interval_secs": 0}}"#);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = ServersFile::from_json("{ not json");
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("Invalid servers file")));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"servers": [{{"id": "a", "name": "A", "transport": {{"type": "stdio", "command": "a"}}}}]}}"#
        )
        .unwrap();

        let loaded = ServersFile::load(file.path()).unwrap();
        assert_eq!(loaded.servers[0].id, "a");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ServersFile::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.servers.is_empty());
    }
}
