//! Deployment records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::fsm::DeploymentStatus;
use crate::models::ids::{DeployableVersionId, DeploymentId, EnvironmentId, ServiceId};

/// A request to roll one deployable version of a service out to an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,

    pub environment_id: EnvironmentId,

    pub service_id: ServiceId,

    pub deployable_version_id: DeployableVersionId,

    pub status: DeploymentStatus,

    /// Declared by the requester; bypasses concurrency throttling.
    /// Never changes after creation.
    #[serde(default)]
    emergency_rollback: bool,

    #[serde(default)]
    pub source_version: String,

    #[serde(default)]
    pub user_email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_params: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// Create a queued deployment
    pub fn new(
        environment_id: EnvironmentId,
        service_id: ServiceId,
        deployable_version_id: DeployableVersionId,
        emergency_rollback: bool,
    ) -> Self {
        Self {
            id: DeploymentId::new(),
            environment_id,
            service_id,
            deployable_version_id,
            status: DeploymentStatus::Pending,
            emergency_rollback,
            source_version: String::new(),
            user_email: String::new(),
            deployment_params: None,
            created_at: Utc::now(),
        }
    }

    /// Set audit metadata
    pub fn with_source(
        mut self,
        source_version: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        self.source_version = source_version.into();
        self.user_email = user_email.into();
        self
    }

    /// Set opaque deployment parameters
    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.deployment_params = Some(params.into());
        self
    }

    pub fn is_emergency_rollback(&self) -> bool {
        self.emergency_rollback
    }
}
