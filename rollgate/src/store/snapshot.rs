//! JSON snapshots of the record store

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ControlError;
use crate::filesys::file::File;
use crate::models::deployment::Deployment;
use crate::models::environment::Environment;
use crate::store::memory::MemoryStore;

/// Every record held by a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub environments: Vec<Environment>,

    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

impl MemoryStore {
    /// Seed a store from a snapshot file; a missing file yields an empty store
    pub async fn load_snapshot(file: &File) -> Result<Self, ControlError> {
        if !file.exists().await {
            info!("No snapshot at {}, starting empty", file.path().display());
            return Ok(Self::new());
        }

        let snapshot: StoreSnapshot = file.read_json().await?;
        info!(
            "Loaded {} environments and {} deployments from {}",
            snapshot.environments.len(),
            snapshot.deployments.len(),
            file.path().display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write every record to a snapshot file
    pub async fn save_snapshot(&self, file: &File) -> Result<(), ControlError> {
        let snapshot = self.snapshot().await?;
        file.write_json(&snapshot).await?;
        info!("Saved snapshot to {}", file.path().display());
        Ok(())
    }
}
