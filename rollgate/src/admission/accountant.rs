//! Concurrency accounting

use std::sync::Arc;

use crate::errors::ControlError;
use crate::lifecycle::fsm::DeploymentStatus;
use crate::models::ids::{DeploymentId, EnvironmentId};
use crate::store::RecordStore;

/// Counts the deployments occupying an environment's concurrency budget
pub struct ConcurrencyAccountant<S: RecordStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> ConcurrencyAccountant<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Occupying deployments in `environment_id`, not counting `candidate`
    pub async fn count(
        &self,
        environment_id: EnvironmentId,
        candidate: DeploymentId,
    ) -> Result<usize, ControlError> {
        // one query, so the count comes from a single store snapshot
        let started = self
            .store
            .find_deployments_by_environment_and_status(environment_id, DeploymentStatus::Started)
            .await?;

        Ok(started
            .iter()
            .filter(|d| d.id != candidate && d.status.is_occupying())
            .count())
    }
}

impl<S: RecordStore + ?Sized> Clone for ConcurrencyAccountant<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}
