//! Garbage collection of infrastructure orphaned by crashes and restarts.
//!
//! Each run cross-checks live containers and networks against a fresh view of
//! the control plane: containers whose workspace is gone or no longer declares
//! the machine active are killed and removed, then empty workspace networks
//! without an active runtime are removed. Containers go first so the networks
//! they held are already empty when the network pass looks at them.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use ws_core::naming::{parse_container_name, parse_network_name};
use ws_core::{ContainerNameInfo, Result};
use ws_provider::{ContainerHandle, ContainerRuntime, NetworkFilter, RemoveOptions};

use crate::ledger::WorkspaceLedger;
use crate::stop_detector::StopDetector;

/// What a single reconciliation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub containers_killed: Vec<String>,
    pub containers_removed: Vec<String>,
    /// Workspace containers left alone because they are still active.
    pub containers_active: Vec<String>,
    /// Workspace containers whose state could not be checked this run.
    pub containers_skipped: Vec<String>,
    pub networks_removed: Vec<String>,
}

pub struct ResourceReconciler {
    runtime: Arc<dyn ContainerRuntime>,
    ledger: Arc<dyn WorkspaceLedger>,
    detector: Option<Arc<StopDetector>>,
    running: Mutex<()>,
}

impl ResourceReconciler {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, ledger: Arc<dyn WorkspaceLedger>) -> Self {
        Self {
            runtime,
            ledger,
            detector: None,
            running: Mutex::new(()),
        }
    }

    /// Stop watching orphans before they are killed, so their death is not
    /// reported as abnormal.
    pub fn with_stop_detector(mut self, detector: Arc<StopDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Run both passes once.
    ///
    /// Returns `None` without doing anything when another run is still in
    /// progress.
    pub async fn run_once(&self) -> Option<ReconcileReport> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Previous reconciliation still running, skipping");
            return None;
        };

        let mut report = ReconcileReport::default();
        self.cleanup_containers(&mut report).await;
        self.cleanup_networks(&mut report).await;

        if !report.containers_active.is_empty() {
            debug!(
                "Containers that are still active: {}",
                report.containers_active.join(", ")
            );
        }
        Some(report)
    }

    async fn cleanup_containers(&self, report: &mut ReconcileReport) {
        let containers = match self.runtime.list_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                error!(error = %e, "Failed to list containers");
                return;
            }
        };

        for container in containers {
            let Some(info) = parse_container_name(&container.name) else {
                continue;
            };

            match self.is_machine_active(&info).await {
                Ok(true) => report.containers_active.push(container.name.clone()),
                Ok(false) => self.remove_orphaned_container(&container, report).await,
                Err(e) => {
                    warn!(
                        container = %container.name,
                        error = %e,
                        "Failed to check whether container is still in use, skipping"
                    );
                    report.containers_skipped.push(container.name.clone());
                }
            }
        }
    }

    async fn is_machine_active(&self, info: &ContainerNameInfo) -> Result<bool> {
        match self.ledger.get_workspace(&info.workspace_id).await {
            Ok(workspace) => Ok(workspace.has_active_machine(&info.machine_id)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn remove_orphaned_container(
        &self,
        container: &ContainerHandle,
        report: &mut ReconcileReport,
    ) {
        if let Some(detector) = &self.detector {
            detector.stop_detection(&container.id);
        }

        if container.is_running() {
            match self.runtime.kill_container(&container.id).await {
                Ok(()) => {
                    info!(container = %container.name, id = %container.id, "Killed abandoned container");
                    report.containers_killed.push(container.name.clone());
                }
                Err(e) => {
                    warn!(container = %container.name, error = %e, "Failed to kill abandoned container")
                }
            }
        }

        match self
            .runtime
            .remove_container(&container.id, RemoveOptions::purge())
            .await
        {
            Ok(()) => {
                info!(container = %container.name, id = %container.id, "Removed abandoned container");
                report.containers_removed.push(container.name.clone());
            }
            Err(e) => {
                warn!(container = %container.name, error = %e, "Failed to remove abandoned container")
            }
        }
    }

    async fn cleanup_networks(&self, report: &mut ReconcileReport) {
        let networks = match self.runtime.list_networks(&NetworkFilter::custom()).await {
            Ok(Some(networks)) => networks,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Failed to list networks");
                return;
            }
        };

        for network in networks {
            let Some(workspace_id) = parse_network_name(&network.name) else {
                continue;
            };
            if !network.containers.is_empty() {
                continue;
            }

            match self.ledger.has_active_runtime(&workspace_id).await {
                Ok(true) => {}
                Ok(false) => match self.runtime.remove_network(&network.id).await {
                    Ok(()) => {
                        info!(network = %network.name, "Removed abandoned network");
                        report.networks_removed.push(network.name.clone());
                    }
                    Err(e) => {
                        warn!(network = %network.name, error = %e, "Failed to remove abandoned network")
                    }
                },
                Err(e) => warn!(
                    network = %network.name,
                    error = %e,
                    "Failed to check runtime of network's workspace, skipping"
                ),
            }
        }
    }
}

/// Run the reconciler every `interval_secs` seconds, forever.
///
/// Ticks that fire while a run is still going are skipped rather than queued.
pub async fn start_reconciler_task(reconciler: Arc<ResourceReconciler>, interval_secs: u64) {
    let mut interval = interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Reconciler task running (checks every {} seconds)",
        interval_secs
    );

    loop {
        interval.tick().await;

        if let Some(report) = reconciler.run_once().await {
            debug!(
                killed = report.containers_killed.len(),
                removed = report.containers_removed.len(),
                networks = report.networks_removed.len(),
                "Reconciliation finished"
            );
        }
    }
}
