//! Deployment status transition tests

use sitedeploy::deploy::fsm::DeploymentStatus;
use sitedeploy::errors::FailureKind;

#[test]
fn test_new_deployments_are_open() {
    assert!(!DeploymentStatus::Processing.is_terminal());
}

#[test]
fn test_publish_flow() {
    // Processing -> Ready
    let status = DeploymentStatus::Processing
        .transition(DeploymentStatus::Ready)
        .unwrap();
    assert_eq!(status, DeploymentStatus::Ready);
    assert!(status.is_terminal());
}

#[test]
fn test_failure_flow() {
    let status = DeploymentStatus::Processing
        .transition(DeploymentStatus::Failed)
        .unwrap();
    assert_eq!(status, DeploymentStatus::Failed);
    assert!(status.is_terminal());
}

#[test]
fn test_terminal_states_are_final() {
    let err = DeploymentStatus::Ready
        .transition(DeploymentStatus::Failed)
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::State);
    assert_eq!(err.to_string(), "Invalid state transition: ready -> failed");

    let err = DeploymentStatus::Failed
        .transition(DeploymentStatus::Ready)
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::State);
}

#[test]
fn test_status_transitions() {
    use DeploymentStatus::*;

    assert_eq!(Processing.transition(Ready).unwrap(), Ready);
    assert_eq!(Processing.transition(Failed).unwrap(), Failed);
    assert!(Processing.transition(Processing).is_err());
    assert!(Ready.transition(Failed).is_err());
    assert!(Failed.transition(Ready).is_err());
    assert!(Ready.transition(Processing).is_err());
    assert!(Failed.transition(Failed).is_err());
}

#[test]
fn test_status_strings() {
    assert_eq!(DeploymentStatus::Processing.to_string(), "processing");
    assert_eq!("ready".parse::<DeploymentStatus>().unwrap(), DeploymentStatus::Ready);
    assert!("done".parse::<DeploymentStatus>().is_err());
    assert_eq!(
        serde_json::to_string(&DeploymentStatus::Failed).unwrap(),
        "\"failed\""
    );
}
