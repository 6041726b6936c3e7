//! Runtime settings and validation.
//!
//! All fields are optional so partial configuration (flags, env, files)
//! falls back to defaults via the `effective_*` accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default idle timeout after which a session is swept (24h).
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Default interval between session sweeps (1h).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Default per-request timeout for transport clients.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default TCP connect timeout for network transports.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of servers connected or queried at once.
pub const DEFAULT_MAX_CONCURRENT_CONNECTS: usize = 4;

/// Where the process is hosted.
///
/// Sandboxed hosts (browser/wasm) cannot spawn processes, so the stdio
/// transport is rejected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEnvironment {
    #[default]
    Native,
    Sandboxed,
}

impl HostEnvironment {
    /// Environment of the current compilation target.
    pub const fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Sandboxed
        } else {
            Self::Native
        }
    }

    pub const fn can_spawn_processes(self) -> bool {
        matches!(self, Self::Native)
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Idle time after which a session is removed by the sweep.
    pub session_idle_timeout_secs: Option<u64>,

    /// Interval between session sweeps.
    pub sweep_interval_secs: Option<u64>,

    /// Per-request timeout applied by transport clients.
    pub request_timeout_secs: Option<u64>,

    /// Connect timeout for network transports.
    pub connect_timeout_secs: Option<u64>,

    /// Maximum servers connected or queried concurrently (1-64).
    pub max_concurrent_connects: Option<usize>,

    /// Host environment override; detected from the target when unset.
    pub host_environment: Option<HostEnvironment>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            session_idle_timeout_secs: Some(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
            sweep_interval_secs: Some(DEFAULT_SWEEP_INTERVAL_SECS),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: Some(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_concurrent_connects: Some(DEFAULT_MAX_CONCURRENT_CONNECTS),
            host_environment: None,
        }
    }

    #[must_use]
    pub const fn effective_session_idle_timeout(&self) -> Duration {
        match self.session_idle_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub const fn effective_sweep_interval(&self) -> Duration {
        match self.sweep_interval_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    #[must_use]
    pub const fn effective_request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub const fn effective_connect_timeout(&self) -> Duration {
        match self.connect_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub const fn effective_max_concurrent_connects(&self) -> usize {
        match self.max_concurrent_connects {
            Some(n) => n,
            None => DEFAULT_MAX_CONCURRENT_CONNECTS,
        }
    }

    #[must_use]
    pub const fn effective_host_environment(&self) -> HostEnvironment {
        match self.host_environment {
            Some(env) => env,
            None => HostEnvironment::current(),
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error(
        "Session idle timeout ({timeout_secs}s) must be longer than the sweep interval ({interval_secs}s)"
    )]
    TimeoutNotAboveInterval {
        timeout_secs: u64,
        interval_secs: u64,
    },

    #[error("Max concurrent connects must be between 1 and 64, got {0}")]
    InvalidConcurrency(usize),
}

/// Validate settings.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let checks = [
        ("session_idle_timeout_secs", settings.session_idle_timeout_secs),
        ("sweep_interval_secs", settings.sweep_interval_secs),
        ("request_timeout_secs", settings.request_timeout_secs),
        ("connect_timeout_secs", settings.connect_timeout_secs),
    ];
    for (field, value) in checks {
        if value == Some(0) {
            return Err(SettingsError::ZeroDuration { field });
        }
    }

    let timeout_secs = settings.effective_session_idle_timeout().as_secs();
    let interval_secs = settings.effective_sweep_interval().as_secs();
    if timeout_secs <= interval_secs {
        return Err(SettingsError::TimeoutNotAboveInterval {
            timeout_secs,
            interval_secs,
        });
    }

    if let Some(n) = settings.max_concurrent_connects {
        if !(1..=64).contains(&n) {
            return Err(SettingsError::InvalidConcurrency(n));
        }
    }

    Ok(())
}
