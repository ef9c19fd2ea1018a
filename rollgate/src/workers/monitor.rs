//! Rollout monitor worker
//!
//! Every poll pass walks all environments in parallel. For one environment it
//! first records the outcome of finished rollouts (freeing their slots), then
//! offers every PENDING deployment, oldest first, to the admission gate while
//! holding the environment's lock. Occupancy is re-read for each candidate, so
//! a pass never admits more than the free slots allow. Denied and undecided
//! deployments stay PENDING for the next pass.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::admission::gate::{Admission, AdmissionGate};
use crate::admission::controller::Verdict;
use crate::cluster::{RolloutExecutor, RolloutProgress};
use crate::errors::ControlError;
use crate::lifecycle::fsm::DeploymentStatus;
use crate::lifecycle::transitions;
use crate::models::deployment::Deployment;
use crate::models::ids::EnvironmentId;
use crate::store::RecordStore;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Monitor worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,

    /// Backoff applied while the record store is unavailable
    pub cooldown: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            initial_delay: Duration::from_secs(1),
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Counters for one poll pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Moved from PENDING to STARTED
    pub admitted: usize,

    /// Denied for lack of capacity, left PENDING
    pub deferred: usize,

    /// Moved from STARTED to DONE
    pub succeeded: usize,

    /// Moved from STARTED to FAILED
    pub failed: usize,

    /// Candidates or rollouts left untouched because of an error
    pub errors: usize,

    /// The record store failed at least once during the pass
    pub store_unavailable: bool,
}

impl PassReport {
    fn merge(&mut self, other: PassReport) {
        self.admitted += other.admitted;
        self.deferred += other.deferred;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.errors += other.errors;
        self.store_unavailable |= other.store_unavailable;
    }

    fn record_error(&mut self, err: &ControlError) {
        self.errors += 1;
        if err.is_retryable() {
            self.store_unavailable = true;
        }
    }
}

/// Drives deployments through their lifecycle
pub struct RolloutMonitor<S: RecordStore + ?Sized> {
    store: Arc<S>,
    gate: Arc<AdmissionGate<S>>,
    executor: Arc<dyn RolloutExecutor>,
}

impl<S: RecordStore + ?Sized> RolloutMonitor<S> {
    pub fn new(
        store: Arc<S>,
        gate: Arc<AdmissionGate<S>>,
        executor: Arc<dyn RolloutExecutor>,
    ) -> Self {
        Self {
            store,
            gate,
            executor,
        }
    }

    /// Run one poll pass over every environment
    pub async fn run_pass(&self) -> Result<PassReport, ControlError> {
        let environments = self.store.list_environments().await?;

        let reports = join_all(
            environments
                .iter()
                .map(|environment| self.process_environment(environment.id)),
        )
        .await;

        let mut total = PassReport::default();
        for report in reports {
            total.merge(report);
        }
        Ok(total)
    }

    async fn process_environment(&self, environment_id: EnvironmentId) -> PassReport {
        let mut report = PassReport::default();

        if let Err(e) = self.track_rollouts(environment_id, &mut report).await {
            error!("Failed to track rollouts in environment {}: {}", environment_id, e);
            report.record_error(&e);
            return report;
        }

        let admitted = self.admit_pending(environment_id, &mut report).await;

        // Whatever reached STARTED goes to the cluster, even if the scan was cut short
        for deployment in admitted {
            if let Err(e) = self.executor.apply(&deployment).await {
                error!("Failed to apply deployment {}: {}", deployment.id, e);
                match transitions::complete(self.store.as_ref(), deployment.id, false).await {
                    Ok(_) => report.failed += 1,
                    Err(e) => {
                        error!("Failed to mark deployment {} as failed: {}", deployment.id, e);
                        report.record_error(&e);
                    }
                }
            }
        }

        report
    }

    async fn track_rollouts(
        &self,
        environment_id: EnvironmentId,
        report: &mut PassReport,
    ) -> Result<(), ControlError> {
        let started = self
            .store
            .find_deployments_by_environment_and_status(environment_id, DeploymentStatus::Started)
            .await?;

        for deployment in started {
            let progress = match self.executor.progress(&deployment).await {
                Ok(progress) => progress,
                Err(e) => {
                    warn!("Failed to read progress of deployment {}: {}", deployment.id, e);
                    report.record_error(&e);
                    continue;
                }
            };

            let succeeded = match progress {
                RolloutProgress::InProgress => continue,
                RolloutProgress::Succeeded => true,
                RolloutProgress::Failed(reason) => {
                    warn!("Deployment {} rollout failed: {}", deployment.id, reason);
                    false
                }
            };

            match transitions::complete(self.store.as_ref(), deployment.id, succeeded).await {
                Ok(DeploymentStatus::Done) => report.succeeded += 1,
                Ok(_) => report.failed += 1,
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    // canceled meanwhile
                    debug!("Skipping completion of deployment {}: {}", deployment.id, e);
                }
            }
        }

        Ok(())
    }

    /// Admit what fits; returns the deployments moved to STARTED.
    ///
    /// A store failure ends the scan but keeps the deployments admitted so far.
    async fn admit_pending(
        &self,
        environment_id: EnvironmentId,
        report: &mut PassReport,
    ) -> Vec<Deployment> {
        let guard = self.gate.lock(environment_id).await;

        let pending = match self
            .store
            .find_deployments_by_environment_and_status(environment_id, DeploymentStatus::Pending)
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                error!("Failed to scan queue of environment {}: {}", environment_id, e);
                report.record_error(&e);
                return Vec::new();
            }
        };

        let mut admitted = Vec::new();
        for candidate in pending {
            match self.gate.admit(&guard, candidate.id).await {
                Ok(Admission {
                    verdict: Verdict::Allow(_),
                    deployment,
                }) => {
                    report.admitted += 1;
                    admitted.push(deployment);
                }
                Ok(Admission { verdict, .. }) => {
                    debug!("Deployment {} stays queued: {}", candidate.id, verdict);
                    report.deferred += 1;
                }
                Err(e) if e.is_retryable() => {
                    error!("Stopped admitting in environment {}: {}", environment_id, e);
                    report.record_error(&e);
                    break;
                }
                Err(e) => {
                    error!("Deployment {} left queued: {}", candidate.id, e);
                    report.record_error(&e);
                }
            }
        }

        admitted
    }
}

/// Run the monitor worker
pub async fn run<S, F, R>(
    options: &Options,
    monitor: &RolloutMonitor<R>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
    R: RecordStore + ?Sized,
{
    info!("Rollout monitor starting...");

    let mut delay = options.initial_delay;
    let mut err_streak: u32 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Rollout monitor shutting down...");
                return;
            }
            _ = sleep_fn(delay) => {
                // Continue with pass
            }
        }

        debug!("Running rollout monitor pass...");

        let store_unavailable = match monitor.run_pass().await {
            Ok(report) => {
                if report.admitted + report.succeeded + report.failed > 0 {
                    info!(
                        "Monitor pass: {} admitted, {} deferred, {} done, {} failed",
                        report.admitted, report.deferred, report.succeeded, report.failed
                    );
                }
                report.store_unavailable
            }
            Err(e) => {
                error!("Monitor pass failed: {}", e);
                e.is_retryable()
            }
        };

        if store_unavailable {
            delay = calc_exp_backoff(&options.cooldown, err_streak);
            err_streak = err_streak.saturating_add(1);
            warn!("Record store unavailable, next pass in {:?}", delay);
        } else {
            err_streak = 0;
            delay = options.interval;
        }
    }
}
