//! Finite State Machine for the deployment lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ControlError;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// Queued, not yet admitted
    Pending,

    /// Admitted, rollout in progress
    Started,

    /// Rollout succeeded
    Done,

    /// Rollout failed
    Failed,

    /// Withdrawn before or during rollout
    Canceled,
}

/// Deployment event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// The admission controller allowed the deployment to start
    Admit,

    /// The cluster reported a successful rollout
    Succeed,

    /// The cluster reported a failed rollout
    Fail,

    /// Explicit cancellation
    Cancel,
}

impl DeploymentEvent {
    /// Status this event moves a deployment into
    pub fn target(&self) -> DeploymentStatus {
        match self {
            DeploymentEvent::Admit => DeploymentStatus::Started,
            DeploymentEvent::Succeed => DeploymentStatus::Done,
            DeploymentEvent::Fail => DeploymentStatus::Failed,
            DeploymentEvent::Cancel => DeploymentStatus::Canceled,
        }
    }
}

impl DeploymentStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [DeploymentStatus; 5] = [
        DeploymentStatus::Pending,
        DeploymentStatus::Started,
        DeploymentStatus::Done,
        DeploymentStatus::Failed,
        DeploymentStatus::Canceled,
    ];

    /// Whether a deployment in this status counts against the environment's
    /// concurrency limit
    pub fn is_occupying(&self) -> bool {
        match self {
            DeploymentStatus::Started => true,
            DeploymentStatus::Pending
            | DeploymentStatus::Done
            | DeploymentStatus::Failed
            | DeploymentStatus::Canceled => false,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        match self {
            DeploymentStatus::Done | DeploymentStatus::Failed | DeploymentStatus::Canceled => true,
            DeploymentStatus::Pending | DeploymentStatus::Started => false,
        }
    }

    /// Process an event and return the next status
    pub fn apply(self, event: DeploymentEvent) -> Result<DeploymentStatus, ControlError> {
        let next = match (self, event) {
            (DeploymentStatus::Pending, DeploymentEvent::Admit) => DeploymentStatus::Started,
            (DeploymentStatus::Pending, DeploymentEvent::Cancel) => DeploymentStatus::Canceled,

            (DeploymentStatus::Started, DeploymentEvent::Succeed) => DeploymentStatus::Done,
            (DeploymentStatus::Started, DeploymentEvent::Fail) => DeploymentStatus::Failed,
            (DeploymentStatus::Started, DeploymentEvent::Cancel) => DeploymentStatus::Canceled,

            (from, event) => {
                return Err(ControlError::InvalidTransition {
                    from,
                    to: event.target(),
                });
            }
        };
        Ok(next)
    }

    /// Whether some event moves this status directly into `next`
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        [
            DeploymentEvent::Admit,
            DeploymentEvent::Succeed,
            DeploymentEvent::Fail,
            DeploymentEvent::Cancel,
        ]
        .into_iter()
        .any(|event| self.apply(event).map(|s| s == next).unwrap_or(false))
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "PENDING",
            DeploymentStatus::Started => "STARTED",
            DeploymentStatus::Done => "DONE",
            DeploymentStatus::Failed => "FAILED",
            DeploymentStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}
