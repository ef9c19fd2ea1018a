//! Store-backed lifecycle transitions

use tracing::info;

use crate::errors::ControlError;
use crate::lifecycle::fsm::{DeploymentEvent, DeploymentStatus};
use crate::models::ids::DeploymentId;
use crate::store::RecordStore;

/// Apply `event` to the stored deployment and persist the new status
pub async fn transition<S: RecordStore + ?Sized>(
    store: &S,
    id: DeploymentId,
    event: DeploymentEvent,
) -> Result<DeploymentStatus, ControlError> {
    let deployment = store.find_deployment_by_id(id).await?;
    let next = deployment.status.apply(event)?;
    store.update_deployment_status(id, next).await?;
    info!("Deployment {}: {} -> {}", id, deployment.status, next);
    Ok(next)
}

/// Record the observed outcome of a STARTED rollout
pub async fn complete<S: RecordStore + ?Sized>(
    store: &S,
    id: DeploymentId,
    succeeded: bool,
) -> Result<DeploymentStatus, ControlError> {
    let event = if succeeded {
        DeploymentEvent::Succeed
    } else {
        DeploymentEvent::Fail
    };
    transition(store, id, event).await
}

/// Withdraw a PENDING or STARTED deployment
pub async fn cancel<S: RecordStore + ?Sized>(
    store: &S,
    id: DeploymentId,
) -> Result<DeploymentStatus, ControlError> {
    transition(store, id, DeploymentEvent::Cancel).await
}
