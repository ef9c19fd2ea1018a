//! Cluster-apply path
//!
//! Applying manifests and watching rollout readiness belong to the
//! orchestrator client. The monitor only needs to hand admitted deployments
//! over and to learn how their rollouts ended.

use async_trait::async_trait;
use tracing::info;

use crate::errors::ControlError;
use crate::models::deployment::Deployment;

/// Observed state of a rollout on the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutProgress {
    InProgress,
    Succeeded,
    Failed(String),
}

#[async_trait]
pub trait RolloutExecutor: Send + Sync {
    /// Start rolling out an admitted deployment
    async fn apply(&self, deployment: &Deployment) -> Result<(), ControlError>;

    /// Report how far a started rollout has got
    async fn progress(&self, deployment: &Deployment) -> Result<RolloutProgress, ControlError>;
}

/// Executor that touches no cluster; every rollout succeeds immediately
#[derive(Debug, Clone, Default)]
pub struct DryRunCluster;

#[async_trait]
impl RolloutExecutor for DryRunCluster {
    async fn apply(&self, deployment: &Deployment) -> Result<(), ControlError> {
        info!(
            "[dry-run] Applying deployment {} (service {}, version {}, emergency rollback: {})",
            deployment.id,
            deployment.service_id,
            deployment.deployable_version_id,
            deployment.is_emergency_rollback()
        );
        Ok(())
    }

    async fn progress(&self, _deployment: &Deployment) -> Result<RolloutProgress, ControlError> {
        Ok(RolloutProgress::Succeeded)
    }
}
