use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use ws_janitor::{track_running_containers, ApiLedger, JanitorConfig};
use ws_provider::docker::DockerRuntime;
use ws_provider::ContainerRuntime;
use ws_runtime::{start_reconciler_task, ResourceReconciler, StopDetector};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = ws_logging::init_subscriber();

    info!("Starting ws-janitor...");

    let config = JanitorConfig::from_env();
    info!(
        "Configuration loaded: api_endpoint={}, cleanup_interval={}s",
        config.api_endpoint, config.cleanup_interval_secs
    );

    let docker = DockerRuntime::new(config.docker_binary.clone());
    docker
        .check_daemon_running()
        .await
        .context("Docker daemon is not reachable")?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    let ledger = Arc::new(
        ApiLedger::new(&config.api_endpoint, config.api_token.clone())
            .context("Failed to set up workspace API client")?,
    );

    // Stop detection
    let detector = Arc::new(StopDetector::new(runtime.clone(), config.stop_detector()));
    let detector_task = detector.spawn();
    match track_running_containers(runtime.as_ref(), &detector).await {
        Ok(count) => info!("Tracking {} running workspace containers", count),
        Err(e) => warn!(error = %e, "Failed to register running containers"),
    }

    // Reconciliation
    let reconciler = Arc::new(
        ResourceReconciler::new(runtime.clone(), ledger).with_stop_detector(detector.clone()),
    );
    let reconciler_task = tokio::spawn(start_reconciler_task(
        reconciler,
        config.cleanup_interval_secs,
    ));
    info!(
        "Reconciler task started (interval: {}s)",
        config.cleanup_interval_secs
    );

    // Containers started after boot are registered on the next refresh.
    let tracking_runtime = runtime.clone();
    let tracking_detector = detector.clone();
    let tracking_interval = std::time::Duration::from_secs(config.tracking_interval_secs.max(1));
    let tracking_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tracking_interval);
        loop {
            interval.tick().await;
            if let Err(e) =
                track_running_containers(tracking_runtime.as_ref(), &tracking_detector).await
            {
                error!(error = %e, "Failed to refresh tracked containers");
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down ws-janitor");

    tracking_task.abort();
    reconciler_task.abort();
    detector_task.abort();

    Ok(())
}
