//! Rollout monitor tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rollgate::admission::AdmissionGate;
use rollgate::cluster::{RolloutExecutor, RolloutProgress};
use rollgate::errors::ControlError;
use rollgate::lifecycle::fsm::DeploymentStatus;
use rollgate::models::deployment::Deployment;
use rollgate::models::environment::{ConcurrencyLimit, Environment};
use rollgate::models::ids::{DeployableVersionId, DeploymentId, EnvironmentId, ServiceId};
use rollgate::store::{MemoryStore, RecordStore};
use rollgate::workers::monitor::{self, PassReport, RolloutMonitor};

use crate::common::Fixture;

/// Cluster whose rollouts stay in progress until the test says otherwise
#[derive(Default)]
struct ScriptedCluster {
    applied: Mutex<Vec<DeploymentId>>,
    applied_statuses: Mutex<Vec<DeploymentStatus>>,
    outcomes: Mutex<HashMap<DeploymentId, RolloutProgress>>,
    broken: Mutex<HashSet<DeploymentId>>,
}

impl ScriptedCluster {
    fn finish(&self, id: DeploymentId, progress: RolloutProgress) {
        self.outcomes.lock().unwrap().insert(id, progress);
    }

    fn break_apply(&self, id: DeploymentId) {
        self.broken.lock().unwrap().insert(id);
    }

    fn applied(&self) -> Vec<DeploymentId> {
        self.applied.lock().unwrap().clone()
    }

    fn applied_statuses(&self) -> Vec<DeploymentStatus> {
        self.applied_statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl RolloutExecutor for ScriptedCluster {
    async fn apply(&self, deployment: &Deployment) -> Result<(), ControlError> {
        if self.broken.lock().unwrap().contains(&deployment.id) {
            return Err(ControlError::Internal("manifest rejected".to_string()));
        }
        self.applied.lock().unwrap().push(deployment.id);
        self.applied_statuses.lock().unwrap().push(deployment.status);
        Ok(())
    }

    async fn progress(&self, deployment: &Deployment) -> Result<RolloutProgress, ControlError> {
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .get(&deployment.id)
            .cloned()
            .unwrap_or(RolloutProgress::InProgress))
    }
}

/// Store whose deployment lookups go down after a number of successful calls
struct FailingLookups {
    inner: Arc<MemoryStore>,
    lookups_left: AtomicUsize,
}

impl FailingLookups {
    fn new(inner: Arc<MemoryStore>, lookups: usize) -> Self {
        Self {
            inner,
            lookups_left: AtomicUsize::new(lookups),
        }
    }
}

#[async_trait]
impl RecordStore for FailingLookups {
    async fn find_environment_by_id(&self, id: EnvironmentId) -> Result<Environment, ControlError> {
        self.inner.find_environment_by_id(id).await
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, ControlError> {
        self.inner.list_environments().await
    }

    async fn find_deployment_by_id(&self, id: DeploymentId) -> Result<Deployment, ControlError> {
        let left = self
            .lookups_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if left.is_err() {
            return Err(ControlError::StoreUnavailable("connection reset".to_string()));
        }
        self.inner.find_deployment_by_id(id).await
    }

    async fn find_deployments_by_environment_and_status(
        &self,
        environment_id: EnvironmentId,
        status: DeploymentStatus,
    ) -> Result<Vec<Deployment>, ControlError> {
        self.inner
            .find_deployments_by_environment_and_status(environment_id, status)
            .await
    }

    async fn update_deployment_status(
        &self,
        id: DeploymentId,
        status: DeploymentStatus,
    ) -> Result<(), ControlError> {
        self.inner.update_deployment_status(id, status).await
    }

    async fn update_concurrency_limit(
        &self,
        id: EnvironmentId,
        concurrency_limit: i64,
    ) -> Result<(), ControlError> {
        self.inner.update_concurrency_limit(id, concurrency_limit).await
    }
}

fn monitor_for(
    store: &Arc<MemoryStore>,
    cluster: &Arc<ScriptedCluster>,
) -> RolloutMonitor<MemoryStore> {
    let gate = Arc::new(AdmissionGate::new(store.clone()));
    RolloutMonitor::new(store.clone(), gate, cluster.clone())
}

#[tokio::test]
async fn test_pass_admits_fifo_up_to_limit() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(2)).await;
    let first = fixture.queue(false).await;
    let second = fixture.queue(false).await;
    let third = fixture.queue(false).await;

    let cluster = Arc::new(ScriptedCluster::default());
    let monitor = monitor_for(&fixture.store, &cluster);

    let report = monitor.run_pass().await.unwrap();
    assert_eq!(report.admitted, 2);
    assert_eq!(report.deferred, 1);
    assert_eq!(cluster.applied(), vec![first.id, second.id]);
    assert_eq!(fixture.status_of(&third).await, DeploymentStatus::Pending);

    // nothing finished, nothing moves
    let report = monitor.run_pass().await.unwrap();
    assert_eq!(report.admitted, 0);
    assert_eq!(report.deferred, 1);

    cluster.finish(first.id, RolloutProgress::Succeeded);
    let report = monitor.run_pass().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.admitted, 1);
    assert_eq!(fixture.status_of(&first).await, DeploymentStatus::Done);
    assert_eq!(fixture.status_of(&third).await, DeploymentStatus::Started);
}

#[tokio::test]
async fn test_emergency_rollback_jumps_a_full_environment() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(1)).await;
    fixture.started(false).await;
    let queued = fixture.queue(false).await;
    let rollback = fixture.queue(true).await;

    let cluster = Arc::new(ScriptedCluster::default());
    let report = monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();

    assert_eq!(report.admitted, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(cluster.applied(), vec![rollback.id]);
    assert_eq!(fixture.status_of(&rollback).await, DeploymentStatus::Started);
    assert_eq!(fixture.status_of(&queued).await, DeploymentStatus::Pending);
}

#[tokio::test]
async fn test_failed_rollout_frees_slot() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(1)).await;
    let running = fixture.started(false).await;
    let queued = fixture.queue(false).await;

    let cluster = Arc::new(ScriptedCluster::default());
    cluster.finish(running.id, RolloutProgress::Failed("pods crash-looping".to_string()));

    let report = monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.admitted, 1);
    assert_eq!(fixture.status_of(&running).await, DeploymentStatus::Failed);
    assert_eq!(fixture.status_of(&queued).await, DeploymentStatus::Started);
}

#[tokio::test]
async fn test_apply_failure_marks_deployment_failed() {
    let fixture = Fixture::new(ConcurrencyLimit::Unlimited).await;
    let broken = fixture.queue(false).await;

    let cluster = Arc::new(ScriptedCluster::default());
    cluster.break_apply(broken.id);

    let report = monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();
    assert_eq!(report.admitted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(fixture.status_of(&broken).await, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_canceled_deployments_are_skipped() {
    let fixture = Fixture::new(ConcurrencyLimit::Unlimited).await;
    let canceled = fixture.queue(false).await;
    rollgate::lifecycle::transitions::cancel(fixture.store.as_ref(), canceled.id)
        .await
        .unwrap();

    let cluster = Arc::new(ScriptedCluster::default());
    let report = monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();
    assert_eq!(report, PassReport::default());
    assert!(cluster.applied().is_empty());
}

#[tokio::test]
async fn test_corrupted_environment_leaves_queue_untouched() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(1)).await;
    let healthy = fixture
        .add_environment("healthy", ConcurrencyLimit::AtMost(1))
        .await;
    let stuck = fixture.queue(false).await;
    let rollback = fixture.queue(true).await;
    let fine = fixture.queue_in(&healthy, false).await;

    let mut broken = fixture.environment.clone();
    broken.concurrency_limit = -9;
    fixture.store.add_environment(broken).await.unwrap();

    let cluster = Arc::new(ScriptedCluster::default());
    let report = monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();

    assert_eq!(report.errors, 1);
    assert!(!report.store_unavailable);
    assert_eq!(report.admitted, 2);
    assert_eq!(fixture.status_of(&stuck).await, DeploymentStatus::Pending);
    assert_eq!(fixture.status_of(&rollback).await, DeploymentStatus::Started);
    assert_eq!(fixture.status_of(&fine).await, DeploymentStatus::Started);
}

#[tokio::test]
async fn test_store_outage_fails_pass_without_changes() {
    let fixture = Fixture::new(ConcurrencyLimit::Unlimited).await;
    let queued = fixture.queue(false).await;

    let cluster = Arc::new(ScriptedCluster::default());
    let monitor = monitor_for(&fixture.store, &cluster);

    fixture.store.set_available(false);
    let err = monitor.run_pass().await.unwrap_err();
    assert!(err.is_retryable());

    fixture.store.set_available(true);
    assert_eq!(fixture.status_of(&queued).await, DeploymentStatus::Pending);
    assert!(cluster.applied().is_empty());
}

#[tokio::test]
async fn test_outage_mid_scan_still_applies_admitted() {
    let fixture = Fixture::new(ConcurrencyLimit::Unlimited).await;
    let first = fixture.queue(false).await;
    let second = fixture.queue(false).await;

    let store = Arc::new(FailingLookups::new(fixture.store.clone(), 1));
    let gate = Arc::new(AdmissionGate::new(store.clone()));
    let cluster = Arc::new(ScriptedCluster::default());
    let monitor = RolloutMonitor::new(store, gate, cluster.clone());

    let report = monitor.run_pass().await.unwrap();
    assert_eq!(report.admitted, 1);
    assert_eq!(report.errors, 1);
    assert!(report.store_unavailable);

    assert_eq!(fixture.status_of(&first).await, DeploymentStatus::Started);
    assert_eq!(fixture.status_of(&second).await, DeploymentStatus::Pending);
    assert_eq!(cluster.applied(), vec![first.id]);
}

#[tokio::test]
async fn test_executor_receives_started_record() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(2)).await;
    fixture.queue(false).await;
    fixture.queue(true).await;

    let cluster = Arc::new(ScriptedCluster::default());
    monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();

    assert_eq!(
        cluster.applied_statuses(),
        vec![DeploymentStatus::Started, DeploymentStatus::Started]
    );
}

#[tokio::test]
async fn test_rollback_without_environment_waits_for_direct_admission() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(1)).await;
    let orphan = Deployment::new(
        EnvironmentId::new(),
        ServiceId::new(),
        DeployableVersionId::new(),
        true,
    );
    fixture.store.add_deployment(orphan.clone()).await.unwrap();

    let cluster = Arc::new(ScriptedCluster::default());
    let report = monitor_for(&fixture.store, &cluster).run_pass().await.unwrap();
    assert_eq!(report, PassReport::default());
    assert_eq!(fixture.status_of(&orphan).await, DeploymentStatus::Pending);

    let gate = AdmissionGate::new(fixture.store.clone());
    assert!(gate.try_admit(orphan.id).await.unwrap().is_allowed());
    assert_eq!(fixture.status_of(&orphan).await, DeploymentStatus::Started);
}

#[tokio::test]
async fn test_worker_runs_until_shutdown() {
    let fixture = Fixture::new(ConcurrencyLimit::AtMost(1)).await;
    let queued = fixture.queue(false).await;

    let cluster = Arc::new(ScriptedCluster::default());
    let monitor = monitor_for(&fixture.store, &cluster);
    let options = monitor::Options {
        interval: Duration::from_millis(10),
        initial_delay: Duration::from_millis(1),
        ..Default::default()
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let store = fixture.store.clone();
    let id = queued.id;
    let stopper = async move {
        loop {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if store.find_deployment_by_id(id).await.unwrap().status == DeploymentStatus::Started {
                let _ = shutdown_tx.send(());
                return;
            }
        }
    };

    let worker = monitor::run(
        &options,
        &monitor,
        tokio::time::sleep,
        Box::pin(async move {
            let _ = shutdown_rx.await;
        }),
    );

    tokio::time::timeout(Duration::from_secs(5), futures::future::join(worker, stopper))
        .await
        .expect("monitor worker did not stop");
    assert_eq!(cluster.applied(), vec![queued.id]);
}
