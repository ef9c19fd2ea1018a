//! Application configuration options

use std::time::Duration;

use crate::filesys::file::File;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::utils::CooldownOptions;
use crate::workers::monitor;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Enable operator HTTP server
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Rollout monitor options
    pub monitor: monitor::Options,

    /// Snapshot used to seed the record store
    pub snapshot_file: Option<File>,

    /// Write the record store back to the snapshot on shutdown
    pub save_snapshot_on_shutdown: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            enable_server: true,
            server: ServerOptions::default(),
            monitor: monitor::Options::default(),
            snapshot_file: None,
            save_snapshot_on_shutdown: false,
        }
    }
}

impl AppOptions {
    /// Build options from a settings file and a storage layout
    pub fn from_settings(settings: &Settings, layout: &StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: settings.max_shutdown_delay(),
            },
            enable_server: settings.enable_server,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            monitor: monitor::Options {
                interval: Duration::from_secs(settings.monitor.poll_interval_secs),
                initial_delay: Duration::from_secs(settings.monitor.initial_delay_secs),
                cooldown: CooldownOptions {
                    max_delay: Duration::from_secs(settings.monitor.max_backoff_secs),
                    ..Default::default()
                },
            },
            snapshot_file: Some(layout.snapshot_file()),
            save_snapshot_on_shutdown: settings.save_snapshot_on_shutdown,
        }
    }
}

/// Lifecycle options for the control plane
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Operator HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
