//! Deployment record store
//!
//! The control plane never owns durable state. Everything it decides on is read
//! through [`RecordStore`], and every status change it makes is written back
//! through it. The store is the sole arbiter between concurrent writers and
//! must serve each query from one consistent snapshot.

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;

use crate::errors::ControlError;
use crate::lifecycle::fsm::DeploymentStatus;
use crate::models::deployment::Deployment;
use crate::models::environment::Environment;
use crate::models::ids::{DeploymentId, EnvironmentId};

pub use memory::MemoryStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fails with `NotFound` when no such environment exists
    async fn find_environment_by_id(&self, id: EnvironmentId) -> Result<Environment, ControlError>;

    async fn list_environments(&self) -> Result<Vec<Environment>, ControlError>;

    /// Fails with `NotFound` when no such deployment exists
    async fn find_deployment_by_id(&self, id: DeploymentId) -> Result<Deployment, ControlError>;

    /// Deployments of one environment in one status, oldest first
    async fn find_deployments_by_environment_and_status(
        &self,
        environment_id: EnvironmentId,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, ControlError>;

    async fn update_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), ControlError>;

    /// Administrative update; rejects anything other than -1 or a non-negative value
    async fn update_concurrency_limit(
        &self,
        id: EnvironmentId,
        concurrency_limit: i64,
    ) -> Result<(), ControlError>;
}
