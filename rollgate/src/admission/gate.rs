//! Per-environment admission critical section

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

use crate::admission::controller::{AdmissionController, Verdict};
use crate::errors::ControlError;
use crate::lifecycle::fsm::DeploymentEvent;
use crate::models::deployment::Deployment;
use crate::models::ids::{DeploymentId, EnvironmentId};
use crate::store::RecordStore;

/// Exclusive right to admit deployments into one environment
pub struct EnvironmentGuard {
    environment_id: EnvironmentId,
    _guard: OwnedMutexGuard<()>,
}

impl EnvironmentGuard {
    pub fn environment_id(&self) -> EnvironmentId {
        self.environment_id
    }
}

/// Result of offering one deployment to the gate
#[derive(Debug, Clone)]
pub struct Admission {
    pub verdict: Verdict,

    /// The record as stored once the decision was applied
    pub deployment: Deployment,
}

/// Serializes read-decide-write admission sequences per environment.
///
/// Different environments are admitted in parallel. Within an environment the
/// occupancy read, the verdict and the STARTED write happen while holding the
/// environment's lock, so two candidates can never both see the last free slot.
pub struct AdmissionGate<S: RecordStore + ?Sized> {
    store: Arc<S>,
    controller: AdmissionController<S>,
    locks: Mutex<HashMap<EnvironmentId, Arc<AsyncMutex<()>>>>,
}

impl<S: RecordStore + ?Sized> AdmissionGate<S> {
    pub fn new(store: Arc<S>) -> Self {
        let controller = AdmissionController::new(store.clone());
        Self {
            store,
            controller,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn controller(&self) -> &AdmissionController<S> {
        &self.controller
    }

    /// Wait for exclusive admission rights on an environment.
    ///
    /// Locks nobody holds or waits for are dropped from the map on the way in.
    pub async fn lock(&self, environment_id: EnvironmentId) -> EnvironmentGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            locks
                .entry(environment_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        EnvironmentGuard {
            environment_id,
            _guard: mutex.lock_owned().await,
        }
    }

    /// Lock the deployment's environment and admit it if allowed
    pub async fn try_admit(&self, deployment_id: DeploymentId) -> Result<Verdict, ControlError> {
        let deployment = self.store.find_deployment_by_id(deployment_id).await?;
        let guard = self.lock(deployment.environment_id).await;
        let admission = self.admit(&guard, deployment_id).await?;
        Ok(admission.verdict)
    }

    /// Decide on a PENDING deployment and, on allow, move it to STARTED.
    ///
    /// The deployment is re-read under the guard, so a stale copy held by the
    /// caller cannot be admitted twice.
    pub async fn admit(
        &self,
        guard: &EnvironmentGuard,
        deployment_id: DeploymentId,
    ) -> Result<Admission, ControlError> {
        let mut deployment = self.store.find_deployment_by_id(deployment_id).await?;

        if deployment.environment_id != guard.environment_id {
            return Err(ControlError::Internal(format!(
                "deployment {} belongs to environment {}, not {}",
                deployment.id, deployment.environment_id, guard.environment_id
            )));
        }

        let next = deployment.status.apply(DeploymentEvent::Admit)?;

        let verdict = self.controller.decide(&deployment).await?;
        if verdict.is_allowed() {
            self.store.update_deployment_status(deployment.id, next).await?;
            deployment.status = next;
            info!(
                "Admitted deployment {} into environment {}: {}",
                deployment.id, deployment.environment_id, verdict
            );
        }
        Ok(Admission {
            verdict,
            deployment,
        })
    }
}
