//! Admission decision

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::admission::accountant::ConcurrencyAccountant;
use crate::errors::ControlError;
use crate::models::deployment::Deployment;
use crate::models::environment::ConcurrencyLimit;
use crate::store::RecordStore;

/// Why a deployment was allowed to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// Emergency rollbacks are never throttled
    EmergencyRollback,

    /// The environment has no concurrency cap
    Unlimited,

    /// The environment has a free slot
    Capacity { occupied: usize, limit: u32 },
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow(AllowReason),
    Deny { occupied: usize, limit: u32 },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow(AllowReason::EmergencyRollback) => {
                f.write_str("allow (emergency rollback)")
            }
            Verdict::Allow(AllowReason::Unlimited) => f.write_str("allow (unlimited)"),
            Verdict::Allow(AllowReason::Capacity { occupied, limit }) => {
                write!(f, "allow ({}/{} occupied)", occupied, limit)
            }
            Verdict::Deny { occupied, limit } => {
                write!(f, "deny ({}/{} occupied)", occupied, limit)
            }
        }
    }
}

/// Decides whether a queued deployment may start.
///
/// Stateless and side-effect free: every call reads the store afresh and
/// nothing is written. Store errors are returned as errors and never folded
/// into a deny verdict.
pub struct AdmissionController<S: RecordStore + ?Sized> {
    store: Arc<S>,
    accountant: ConcurrencyAccountant<S>,
}

impl<S: RecordStore + ?Sized> AdmissionController<S> {
    pub fn new(store: Arc<S>) -> Self {
        let accountant = ConcurrencyAccountant::new(store.clone());
        Self { store, accountant }
    }

    /// Whether `candidate` may transition to STARTED now
    pub async fn is_deploy_allowed(&self, candidate: &Deployment) -> Result<bool, ControlError> {
        self.decide(candidate).await.map(|verdict| verdict.is_allowed())
    }

    /// Full verdict for `candidate`
    pub async fn decide(&self, candidate: &Deployment) -> Result<Verdict, ControlError> {
        // checked before the environment is resolved
        if candidate.is_emergency_rollback() {
            debug!("Deployment {} is an emergency rollback", candidate.id);
            return Ok(Verdict::Allow(AllowReason::EmergencyRollback));
        }

        let environment = self
            .store
            .find_environment_by_id(candidate.environment_id)
            .await?;

        let limit = match environment.concurrency_limit()? {
            ConcurrencyLimit::Unlimited => return Ok(Verdict::Allow(AllowReason::Unlimited)),
            ConcurrencyLimit::AtMost(limit) => limit,
        };

        let occupied = self
            .accountant
            .count(candidate.environment_id, candidate.id)
            .await?;

        let verdict = if occupied < limit as usize {
            Verdict::Allow(AllowReason::Capacity { occupied, limit })
        } else {
            Verdict::Deny { occupied, limit }
        };
        debug!("Deployment {} in {}: {}", candidate.id, environment.name, verdict);
        Ok(verdict)
    }
}

impl<S: RecordStore + ?Sized> Clone for AdmissionController<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            accountant: self.accountant.clone(),
        }
    }
}
