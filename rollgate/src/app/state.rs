//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::admission::gate::AdmissionGate;
use crate::app::options::AppOptions;
use crate::cluster::RolloutExecutor;
use crate::errors::ControlError;
use crate::filesys::file::File;
use crate::store::{MemoryStore, RecordStore};
use crate::workers::monitor::RolloutMonitor;

/// Main application state
pub struct AppState {
    /// Concrete store, kept for snapshots
    pub memory: Arc<MemoryStore>,

    /// The same store behind the record store seam
    pub store: Arc<dyn RecordStore>,

    /// Per-environment admission gate
    pub gate: Arc<AdmissionGate<dyn RecordStore>>,

    /// Rollout monitor
    pub monitor: Arc<RolloutMonitor<dyn RecordStore>>,

    pub started_at: DateTime<Utc>,

    snapshot_file: Option<File>,
    save_snapshot_on_shutdown: bool,
}

impl AppState {
    /// Initialize application state
    pub async fn init(
        options: &AppOptions,
        executor: Arc<dyn RolloutExecutor>,
    ) -> Result<Self, ControlError> {
        info!("Initializing application state...");

        let memory = match &options.snapshot_file {
            Some(file) => Arc::new(MemoryStore::load_snapshot(file).await?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_store(memory, executor, options))
    }

    /// Build state around an existing store
    pub fn with_store(
        memory: Arc<MemoryStore>,
        executor: Arc<dyn RolloutExecutor>,
        options: &AppOptions,
    ) -> Self {
        let store: Arc<dyn RecordStore> = memory.clone();
        let gate = Arc::new(AdmissionGate::new(store.clone()));
        let monitor = Arc::new(RolloutMonitor::new(store.clone(), gate.clone(), executor));

        Self {
            memory,
            store,
            gate,
            monitor,
            started_at: Utc::now(),
            snapshot_file: options.snapshot_file.clone(),
            save_snapshot_on_shutdown: options.save_snapshot_on_shutdown,
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), ControlError> {
        info!("Shutting down application state...");

        if !self.save_snapshot_on_shutdown {
            return Ok(());
        }
        if let Some(file) = &self.snapshot_file {
            if let Err(e) = self.memory.save_snapshot(file).await {
                error!("Failed to save snapshot: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }
}
