//! YAML settings.
//!
//! # Storage layout
//!
//! ```text
//! ~/.feedloader/
//!   config.yaml      (settings, this module)
//!   links.sqlite3    (dedup store, default location)
//! ```
//!
//! # Example
//!
//! ```yaml
//! daemon:
//!   kind: transmission
//!   url: http://127.0.0.1:9091/transmission/rpc
//! download_dir: ~/downloads
//! poll_interval_secs: 10
//! max_wait_secs: 86400
//! launch:
//!   command: [transmission-daemon]
//! ```
//!
//! Every loader has two forms, mirroring the rest of the workspace:
//! `fn_at(home: &Path, …)` for tests and `fn(…)` resolving `dirs::home_dir()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths::{default_btpd_socket, default_dedup_db_path, expand_home, settings_path};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_LAUNCH_ATTEMPTS: u32 = 10;
const DEFAULT_LAUNCH_BACKOFF_MS: u64 = 500;

/// Which daemon to drive and where it listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DaemonSettings {
    /// Length-prefixed bencode RPC over a Unix domain socket.
    Btpd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        socket: Option<PathBuf>,
    },
    /// Session-negotiated JSON RPC over HTTP.
    Transmission { url: String },
}

/// How to start the daemon when it is not reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSettings {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    #[serde(default = "default_launch_attempts")]
    pub attempts: u32,
    #[serde(default = "default_launch_backoff_ms")]
    pub backoff_ms: u64,
}

impl LaunchSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Transfer limits applied after the daemon is up, in KB/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub upload_kbs: u32,
    pub download_kbs: u32,
}

/// Top-level settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub daemon: DaemonSettings,
    pub download_dir: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on one orchestration. Required: there is no safe default.
    pub max_wait_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch: Option<LaunchSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_db: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub shutdown_when_idle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimits>,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_launch_attempts() -> u32 {
    DEFAULT_LAUNCH_ATTEMPTS
}

fn default_launch_backoff_ms() -> u64 {
    DEFAULT_LAUNCH_BACKOFF_MS
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Download directory with `~` expanded against `home`.
    pub fn download_dir_at(&self, home: &Path) -> PathBuf {
        expand_home(&self.download_dir, home)
    }

    /// Dedup database location, falling back to `~/.feedloader/links.sqlite3`.
    pub fn dedup_db_at(&self, home: &Path) -> PathBuf {
        match &self.dedup_db {
            Some(path) => expand_home(path, home),
            None => default_dedup_db_path(home),
        }
    }

    /// Btpd socket location, falling back to `~/.btpd/sock`.
    ///
    /// Returns `None` for the HTTP daemon.
    pub fn btpd_socket_at(&self, home: &Path) -> Option<PathBuf> {
        match &self.daemon {
            DaemonSettings::Btpd { socket: Some(path) } => Some(expand_home(path, home)),
            DaemonSettings::Btpd { socket: None } => Some(default_btpd_socket(home)),
            DaemonSettings::Transmission { .. } => None,
        }
    }

    /// Reject values that parse but cannot drive an orchestration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        if self.max_wait_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "max_wait_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        if self.download_dir.is_relative() && !self.download_dir.starts_with("~") {
            return Err(ConfigError::Invalid {
                field: "download_dir",
                reason: format!(
                    "expected an absolute or ~-relative path, got '{}'",
                    self.download_dir.display()
                ),
            });
        }
        if let DaemonSettings::Transmission { url } = &self.daemon {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    field: "daemon.url",
                    reason: format!("expected an http(s) URL, got '{url}'"),
                });
            }
        }
        if let Some(launch) = &self.launch {
            if launch.command.first().map_or(true, |p| p.trim().is_empty()) {
                return Err(ConfigError::Invalid {
                    field: "launch.command",
                    reason: "program name is empty".to_string(),
                });
            }
            if launch.attempts == 0 {
                return Err(ConfigError::Invalid {
                    field: "launch.attempts",
                    reason: "must allow at least one probe".to_string(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate settings from an explicit file.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let settings: Settings = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Load `<home>/.feedloader/config.yaml`.
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    load_from(&settings_path(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
