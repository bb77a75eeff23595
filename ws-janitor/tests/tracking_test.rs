use async_trait::async_trait;
use std::sync::Arc;
use ws_core::{Result, WsError};
use ws_janitor::track_running_containers;
use ws_provider::mock::MockRuntime;
use ws_runtime::{
    ResourceReconciler, StopDetector, StopDetectorConfig, WorkspaceInfo, WorkspaceLedger,
};

const RUNNING: &str = "/workspace0123456789abcdef_machine0123456789abcdef_alice_dev-machine";
const EXITED: &str = "/workspace0123456789abcdef_machinefedcba9876543210_alice_db";

#[tokio::test]
async fn test_registers_running_workspace_containers_once() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.add_container("c1", RUNNING, "running");
    runtime.add_container("c2", EXITED, "exited");
    runtime.add_container("c3", "/registry", "running");

    let detector = StopDetector::new(runtime.clone(), StopDetectorConfig::default());

    let registered = track_running_containers(runtime.as_ref(), &detector)
        .await
        .unwrap();
    assert_eq!(registered, 1);
    assert!(detector.is_tracking("c1"));
    assert!(!detector.is_tracking("c2"));
    assert!(!detector.is_tracking("c3"));

    let again = track_running_containers(runtime.as_ref(), &detector)
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_listing_failure_is_reported() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.fail_list_containers("daemon unavailable");
    let detector = StopDetector::new(runtime.clone(), StopDetectorConfig::default());

    assert!(track_running_containers(runtime.as_ref(), &detector)
        .await
        .is_err());
}

struct EmptyLedger;

#[async_trait]
impl WorkspaceLedger for EmptyLedger {
    async fn get_workspace(&self, id: &str) -> Result<WorkspaceInfo> {
        Err(WsError::NotFound(id.to_string()))
    }

    async fn has_active_runtime(&self, _workspace_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_reconciler_kills_are_not_tracked_as_abnormal() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.add_container("c1", RUNNING, "running");
    let detector = Arc::new(StopDetector::new(runtime.clone(), StopDetectorConfig::default()));
    track_running_containers(runtime.as_ref(), &detector)
        .await
        .unwrap();
    assert!(detector.is_tracking("c1"));

    let reconciler = ResourceReconciler::new(runtime.clone(), Arc::new(EmptyLedger))
        .with_stop_detector(detector.clone());
    reconciler.run_once().await.unwrap();

    assert_eq!(runtime.killed(), vec!["c1"]);
    assert!(!detector.is_tracking("c1"));
}
