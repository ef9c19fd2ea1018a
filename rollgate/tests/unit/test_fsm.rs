//! Lifecycle state machine tests

use rollgate::errors::ControlError;
use rollgate::lifecycle::fsm::{DeploymentEvent, DeploymentStatus};

#[test]
fn test_fsm_success_flow() {
    // Pending -> Started
    let status = DeploymentStatus::Pending.apply(DeploymentEvent::Admit).unwrap();
    assert_eq!(status, DeploymentStatus::Started);
    assert!(status.is_occupying());

    // Started -> Done
    let status = status.apply(DeploymentEvent::Succeed).unwrap();
    assert_eq!(status, DeploymentStatus::Done);
    assert!(!status.is_occupying());
}

#[test]
fn test_fsm_failure_flow() {
    let status = DeploymentStatus::Pending
        .apply(DeploymentEvent::Admit)
        .and_then(|s| s.apply(DeploymentEvent::Fail))
        .unwrap();
    assert_eq!(status, DeploymentStatus::Failed);
    assert!(status.is_terminal());
}

#[test]
fn test_fsm_cancel_from_pending_and_started() {
    assert_eq!(
        DeploymentStatus::Pending.apply(DeploymentEvent::Cancel).unwrap(),
        DeploymentStatus::Canceled
    );
    assert_eq!(
        DeploymentStatus::Started.apply(DeploymentEvent::Cancel).unwrap(),
        DeploymentStatus::Canceled
    );
}

#[test]
fn test_fsm_cannot_skip_started() {
    for event in [DeploymentEvent::Succeed, DeploymentEvent::Fail] {
        let err = DeploymentStatus::Pending.apply(event).unwrap_err();
        assert!(matches!(
            err,
            ControlError::InvalidTransition {
                from: DeploymentStatus::Pending,
                ..
            }
        ));
    }
}

#[test]
fn test_fsm_no_resurrection() {
    for status in [
        DeploymentStatus::Done,
        DeploymentStatus::Failed,
        DeploymentStatus::Canceled,
    ] {
        assert!(status.apply(DeploymentEvent::Admit).is_err());
        assert!(status.apply(DeploymentEvent::Cancel).is_err());
        assert!(!status.can_transition_to(DeploymentStatus::Pending));
    }
}

#[test]
fn test_fsm_transition_table() {
    use DeploymentStatus::*;

    let allowed = [
        (Pending, Started),
        (Pending, Canceled),
        (Started, Done),
        (Started, Failed),
        (Started, Canceled),
    ];

    for from in DeploymentStatus::ALL {
        for to in DeploymentStatus::ALL {
            assert_eq!(
                from.can_transition_to(to),
                allowed.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
}
