//! Launch checks and `PATH` construction for stdio servers.

use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::path::Path;

#[cfg(unix)]
const PATH_SEPARATOR: &str = ":";
#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";

/// Locations GUI-launched processes on macOS usually lack.
#[cfg(target_os = "macos")]
const MACOS_DEFAULT_PATHS: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

/// Check that `command` names an existing, executable file.
///
/// Only absolute paths are accepted; bare names are left to `PATH` lookup
/// by the caller.
pub fn validate_exe_path(command: &str) -> Result<(), String> {
    let path = Path::new(command);

    if !path.is_absolute() {
        return Err(format!("Command path must be absolute: {command}"));
    }
    if !path.exists() {
        return Err(format!("Command not found: {command}"));
    }
    if !path.is_file() {
        return Err(format!("Command is not a file: {command}"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)
            .map_err(|e| format!("Cannot read permissions of {command}: {e}"))?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(format!("Command is not executable: {command}"));
        }
    }

    Ok(())
}

pub fn validate_working_dir(dir: &str) -> Result<(), String> {
    let path = Path::new(dir);
    if !path.exists() {
        return Err(format!("Working directory does not exist: {dir}"));
    }
    if !path.is_dir() {
        return Err(format!("Working directory is not a directory: {dir}"));
    }
    Ok(())
}

/// `PATH` handed to a spawned server.
///
/// Order: the command's own directory, the current `PATH`, platform
/// defaults, then `path_extra`. Duplicates keep their first position.
pub fn build_effective_path(command: &str, path_extra: Option<&str>) -> OsString {
    let mut entries: Vec<String> = Vec::new();

    if let Some(dir) = Path::new(command).parent().and_then(Path::to_str) {
        entries.push(dir.to_string());
    }

    if let Some(current) = env::var_os("PATH") {
        entries.extend(split_entries(&current.to_string_lossy()));
    }

    #[cfg(target_os = "macos")]
    entries.extend(MACOS_DEFAULT_PATHS.split(':').map(str::to_string));

    if let Some(extra) = path_extra {
        entries.extend(split_entries(extra));
    }

    let mut seen = HashSet::new();
    let joined = entries
        .into_iter()
        .filter(|entry| !entry.is_empty() && seen.insert(entry.clone()))
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR);

    OsString::from(joined)
}

fn split_entries(value: &str) -> Vec<String> {
    value
        .split(PATH_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
