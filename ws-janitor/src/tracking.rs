//! Registration of running workspace containers with the stop detector.

use std::sync::Arc;
use tracing::{debug, warn};
use ws_core::naming::parse_container_name;
use ws_core::Result;
use ws_provider::ContainerRuntime;
use ws_runtime::{AbnormalStopEvent, AbnormalStopHandler, StopDetector};

/// Machine name part of `<workspace>_<machine>_<owner>_<machineName>`.
pub fn machine_name(container_name: &str) -> &str {
    let name = container_name.trim_start_matches('/');
    name.splitn(4, '_').nth(3).unwrap_or(name)
}

fn log_abnormal_stop() -> Arc<dyn AbnormalStopHandler> {
    Arc::new(|event: AbnormalStopEvent| {
        warn!(
            container = %event.container_id,
            machine = %event.machine_name,
            reason = %event.reason,
            "{}",
            event.message
        );
    })
}

/// Start detection for every running workspace container not tracked yet.
/// Returns how many containers were newly registered.
pub async fn track_running_containers(
    runtime: &dyn ContainerRuntime,
    detector: &StopDetector,
) -> Result<usize> {
    let mut registered = 0;
    for container in runtime.list_containers().await? {
        if !container.is_running() || detector.is_tracking(&container.id) {
            continue;
        }
        if parse_container_name(&container.name).is_none() {
            continue;
        }

        let machine = machine_name(&container.name);
        debug!(container = %container.name, machine, "Tracking workspace container");
        detector.start_detection(&container.id, machine, log_abnormal_stop());
        registered += 1;
    }
    Ok(registered)
}
