//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Control plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Also write daily-rotated log files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Operator HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Enable the operator HTTP server
    #[serde(default = "default_true")]
    pub enable_server: bool,

    /// Rollout monitor configuration
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Write the record store back to the snapshot file on shutdown
    #[serde(default = "default_true")]
    pub save_snapshot_on_shutdown: bool,

    /// Maximum graceful shutdown delay in seconds
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_shutdown_delay() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_to_file: false,
            server: ServerSettings::default(),
            enable_server: true,
            monitor: MonitorSettings::default(),
            save_snapshot_on_shutdown: true,
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

impl Settings {
    pub fn max_shutdown_delay(&self) -> Duration {
        Duration::from_secs(self.max_shutdown_delay_secs)
    }
}

/// Operator HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Rollout monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between poll passes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds before the first pass
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Upper bound in seconds for the store-outage backoff
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_initial_delay() -> u64 {
    1
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            initial_delay_secs: default_initial_delay(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}
