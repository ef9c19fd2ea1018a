//! In-process record store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::ControlError;
use crate::lifecycle::fsm::DeploymentStatus;
use crate::models::deployment::Deployment;
use crate::models::environment::{ConcurrencyLimit, Environment};
use crate::models::ids::{DeploymentId, EnvironmentId};
use crate::store::snapshot::StoreSnapshot;
use crate::store::RecordStore;

#[derive(Debug)]
struct DeploymentRow {
    /// Insertion order, breaks ties between equal creation times
    seq: u64,
    deployment: Deployment,
}

#[derive(Debug, Default)]
struct Tables {
    environments: HashMap<EnvironmentId, Environment>,
    deployments: HashMap<DeploymentId, DeploymentRow>,
    next_seq: u64,
}

impl Tables {
    fn insert_deployment(&mut self, deployment: Deployment) {
        let seq = match self.deployments.get(&deployment.id) {
            Some(row) => row.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.deployments
            .insert(deployment.id, DeploymentRow { seq, deployment });
    }

    /// Matching deployments, oldest first
    fn deployments_where(&self, predicate: impl Fn(&Deployment) -> bool) -> Vec<Deployment> {
        let mut rows: Vec<_> = self
            .deployments
            .values()
            .filter(|row| predicate(&row.deployment))
            .collect();
        rows.sort_by_key(|row| (row.deployment.created_at, row.seq));
        rows.into_iter().map(|row| row.deployment.clone()).collect()
    }
}

/// Record store backed by in-memory tables behind a single lock
pub struct MemoryStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Create a store holding the records of a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut tables = Tables::default();
        for env in snapshot.environments {
            if let Err(e) = env.concurrency_limit() {
                warn!("Loaded environment with invalid concurrency limit: {}", e);
            }
            tables.environments.insert(env.id, env);
        }
        for deployment in snapshot.deployments {
            tables.insert_deployment(deployment);
        }

        Self {
            tables: RwLock::new(tables),
            available: AtomicBool::new(true),
        }
    }

    /// Copy every record out of the store
    pub async fn snapshot(&self) -> Result<StoreSnapshot, ControlError> {
        self.check_available()?;
        let tables = self.tables.read().await;

        let mut environments: Vec<_> = tables.environments.values().cloned().collect();
        environments.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(StoreSnapshot {
            environments,
            deployments: tables.deployments_where(|_| true),
        })
    }

    pub async fn add_environment(&self, environment: Environment) -> Result<(), ControlError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.environments.insert(environment.id, environment);
        Ok(())
    }

    pub async fn add_deployment(&self, deployment: Deployment) -> Result<(), ControlError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        debug!(
            "Adding deployment {} to environment {} ({})",
            deployment.id, deployment.environment_id, deployment.status
        );
        tables.insert_deployment(deployment);
        Ok(())
    }

    /// Simulate a store outage; every query fails with `StoreUnavailable`
    /// until availability is restored
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), ControlError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ControlError::StoreUnavailable(
                "record store is not accepting queries".to_string(),
            ))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_environment_by_id(&self, id: EnvironmentId) -> Result<Environment, ControlError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .environments
            .get(&id)
            .cloned()
            .ok_or_else(|| ControlError::NotFound(format!("environment {}", id)))
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, ControlError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut environments: Vec<_> = tables.environments.values().cloned().collect();
        environments.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(environments)
    }

    async fn find_deployment_by_id(&self, id: DeploymentId) -> Result<Deployment, ControlError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .deployments
            .get(&id)
            .map(|row| row.deployment.clone())
            .ok_or_else(|| ControlError::NotFound(format!("deployment {}", id)))
    }

    async fn find_deployments_by_environment_and_status(
        &self,
        environment_id: EnvironmentId,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, ControlError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.deployments_where(|d| d.environment_id == environment_id && d.status == status))
    }

    async fn update_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), ControlError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let deployment = tables
            .deployments
            .get_mut(&id)
            .map(|row| &mut row.deployment)
            .ok_or_else(|| ControlError::NotFound(format!("deployment {}", id)))?;

        if !deployment.status.can_transition_to(status) {
            return Err(ControlError::InvalidTransition {
                from: deployment.status,
                to: status,
            });
        }

        debug!("Deployment {}: {} -> {}", id, deployment.status, status);
        deployment.status = status;
        Ok(())
    }

    async fn update_concurrency_limit(
        &self,
        id: EnvironmentId,
        concurrency_limit: i64,
    ) -> Result<(), ControlError> {
        ConcurrencyLimit::try_from(concurrency_limit)?;
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let environment = tables
            .environments
            .get_mut(&id)
            .ok_or_else(|| ControlError::NotFound(format!("environment {}", id)))?;
        environment.concurrency_limit = concurrency_limit;
        Ok(())
    }
}
