//! Detection of abnormal container termination.
//!
//! A single background task follows the runtime's `die`/`oom` events for the
//! whole process. An `oom` leaves a short-lived marker on the container; a
//! `die` that finds an unexpired marker is attributed to the main process
//! running out of memory. Anything else is reported as an unexpected exit.
//!
//! The marker window matters: an OOM kill of a secondary process can precede
//! an unrelated exit of the main process, so only a `die` that follows the
//! `oom` closely is blamed on memory.

use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use ws_provider::model::{ACTION_DIE, ACTION_OOM};
use ws_provider::{ContainerEvent, ContainerRuntime, EventFilter};

#[derive(Debug, Clone, Deserialize)]
pub struct StopDetectorConfig {
    /// How long an `oom` event may precede the `die` it explains.
    #[serde(default = "default_oom_marker_ttl_secs")]
    pub oom_marker_ttl_secs: u64,

    /// Pause between reopening attempts of the event stream.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_oom_marker_ttl_secs() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for StopDetectorConfig {
    fn default() -> Self {
        Self {
            oom_marker_ttl_secs: default_oom_marker_ttl_secs(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    OomOfMainProcess,
    UnexpectedExit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::OomOfMainProcess => write!(f, "OOM of main process"),
            StopReason::UnexpectedExit => write!(f, "process exited unexpectedly"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbnormalStopEvent {
    pub container_id: String,
    pub machine_name: String,
    pub reason: StopReason,
    /// Human-readable explanation for the workspace owner.
    pub message: String,
}

impl AbnormalStopEvent {
    fn new(container_id: &str, machine_name: &str, reason: StopReason) -> Self {
        let message = match reason {
            StopReason::OomOfMainProcess => format!(
                "Machine '{machine_name}' stopped: {reason}. \
                 The processes in this machine need more RAM than the machine is allowed to use."
            ),
            StopReason::UnexpectedExit => {
                format!("Machine '{machine_name}' stopped abnormally: {reason}.")
            }
        };
        Self {
            container_id: container_id.to_string(),
            machine_name: machine_name.to_string(),
            reason,
            message,
        }
    }
}

/// Callback told about the abnormal death of a tracked container.
pub trait AbnormalStopHandler: Send + Sync {
    fn handle(&self, event: AbnormalStopEvent);
}

impl<F> AbnormalStopHandler for F
where
    F: Fn(AbnormalStopEvent) + Send + Sync,
{
    fn handle(&self, event: AbnormalStopEvent) {
        self(event)
    }
}

struct Registration {
    machine_name: String,
    handler: Arc<dyn AbnormalStopHandler>,
}

pub struct StopDetector {
    runtime: Arc<dyn ContainerRuntime>,
    handlers: DashMap<String, Registration>,
    oom_markers: DashMap<String, Instant>,
    config: StopDetectorConfig,
}

impl StopDetector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: StopDetectorConfig) -> Self {
        Self {
            runtime,
            handlers: DashMap::new(),
            oom_markers: DashMap::new(),
            config,
        }
    }

    /// Report the abnormal death of `container_id` to `handler`.
    ///
    /// Replaces any previous registration for the same container.
    pub fn start_detection(
        &self,
        container_id: &str,
        machine_name: &str,
        handler: Arc<dyn AbnormalStopHandler>,
    ) {
        self.handlers.insert(
            container_id.to_string(),
            Registration {
                machine_name: machine_name.to_string(),
                handler,
            },
        );
    }

    pub fn stop_detection(&self, container_id: &str) {
        self.handlers.remove(container_id);
    }

    pub fn is_tracking(&self, container_id: &str) -> bool {
        self.handlers.contains_key(container_id)
    }

    fn oom_marker_ttl(&self) -> Duration {
        Duration::from_secs(self.config.oom_marker_ttl_secs)
    }

    /// Start the event-following loop on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let detector = Arc::clone(self);
        tokio::spawn(async move { detector.run().await })
    }

    /// Follow the event stream forever, reopening it from the last processed
    /// event whenever it ends or fails.
    pub async fn run(&self) {
        let filter = EventFilter::container_actions(&[ACTION_DIE, ACTION_OOM]);
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut since: Option<i64> = None;

        info!(runtime = self.runtime.name(), "Abnormal stop detection started");

        loop {
            match self.runtime.stream_events(since, &filter).await {
                Ok(mut events) => {
                    while let Some(item) = events.next().await {
                        match item {
                            Ok(event) => {
                                if self.process_event(&event) {
                                    since = Some(event.time);
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Container event stream failed");
                                break;
                            }
                        }
                    }
                    debug!(since = ?since, "Container event stream closed, reopening");
                }
                Err(e) => {
                    error!(error = %e, since = ?since, "Failed to open container event stream");
                }
            }

            tokio::time::sleep(retry_delay).await;
        }
    }

    /// Apply one event. Returns `false` for events that were ignored.
    pub fn process_event(&self, event: &ContainerEvent) -> bool {
        if !event.is_container_event() {
            debug!(kind = %event.kind, id = %event.id, "Ignoring non-container event");
            return false;
        }

        match event.status.as_str() {
            ACTION_OOM => {
                self.record_oom(&event.id);
                true
            }
            ACTION_DIE => {
                self.handle_die(&event.id);
                true
            }
            other => {
                debug!(status = other, id = %event.id, "Ignoring container event");
                false
            }
        }
    }

    fn record_oom(&self, container_id: &str) {
        let now = Instant::now();
        self.oom_markers.retain(|_, deadline| *deadline > now);
        self.oom_markers
            .insert(container_id.to_string(), now + self.oom_marker_ttl());
        debug!(container = container_id, "OOM event recorded");
    }

    fn handle_die(&self, container_id: &str) {
        let now = Instant::now();
        let oom = self
            .oom_markers
            .remove(container_id)
            .is_some_and(|(_, deadline)| deadline > now);
        let reason = if oom {
            StopReason::OomOfMainProcess
        } else {
            StopReason::UnexpectedExit
        };

        let Some((_, registration)) = self.handlers.remove(container_id) else {
            debug!(container = container_id, "Untracked container died");
            return;
        };

        let event = AbnormalStopEvent::new(container_id, &registration.machine_name, reason);
        info!(
            container = container_id,
            machine = %registration.machine_name,
            reason = %reason,
            "Abnormal container stop detected"
        );

        let handler = registration.handler;
        if catch_unwind(AssertUnwindSafe(|| handler.handle(event))).is_err() {
            error!(container = container_id, "Abnormal stop handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use ws_provider::mock::MockRuntime;

    fn detector() -> StopDetector {
        StopDetector::new(Arc::new(MockRuntime::new()), StopDetectorConfig::default())
    }

    fn recording_handler() -> (Arc<dyn AbnormalStopHandler>, Arc<Mutex<Vec<AbnormalStopEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Arc<dyn AbnormalStopHandler> =
            Arc::new(move |event: AbnormalStopEvent| sink.lock().unwrap().push(event));
        (handler, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_oom_followed_by_die_blames_main_process() {
        let detector = detector();
        let (handler, seen) = recording_handler();
        detector.start_detection("c1", "dev-machine", handler);

        detector.process_event(&ContainerEvent::container("oom", "c1", 100));
        tokio::time::advance(Duration::from_secs(3)).await;
        detector.process_event(&ContainerEvent::container("die", "c1", 103));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].reason, StopReason::OomOfMainProcess);
        assert!(seen[0].message.contains("OOM of main process"));
        assert_eq!(seen[0].machine_name, "dev-machine");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_oom_is_not_blamed() {
        let detector = detector();
        let (handler, seen) = recording_handler();
        detector.start_detection("c1", "dev-machine", handler);

        detector.process_event(&ContainerEvent::container("oom", "c1", 100));
        tokio::time::advance(Duration::from_secs(11)).await;
        detector.process_event(&ContainerEvent::container("die", "c1", 111));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].reason, StopReason::UnexpectedExit);
        assert!(seen[0].message.contains("process exited unexpectedly"));
    }

    #[tokio::test]
    async fn test_die_without_oom_is_unexpected_exit() {
        let detector = detector();
        let (handler, seen) = recording_handler();
        detector.start_detection("c1", "db", handler);

        detector.process_event(&ContainerEvent::container("die", "c1", 1));
        assert_eq!(seen.lock().unwrap()[0].reason, StopReason::UnexpectedExit);
        assert!(!detector.is_tracking("c1"));
    }

    #[tokio::test]
    async fn test_oom_marker_is_per_container() {
        let detector = detector();
        let (handler, seen) = recording_handler();
        detector.start_detection("c2", "db", handler);

        detector.process_event(&ContainerEvent::container("oom", "c1", 1));
        detector.process_event(&ContainerEvent::container("die", "c2", 2));
        assert_eq!(seen.lock().unwrap()[0].reason, StopReason::UnexpectedExit);
    }

    #[tokio::test]
    async fn test_untracked_and_deregistered_containers_are_ignored() {
        let detector = detector();
        let (handler, seen) = recording_handler();
        detector.start_detection("c1", "dev", handler);
        detector.stop_detection("c1");

        assert!(detector.process_event(&ContainerEvent::container("die", "c1", 1)));
        assert!(detector.process_event(&ContainerEvent::container("die", "unknown", 1)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_container_events_are_ignored() {
        let detector = detector();
        let (handler, seen) = recording_handler();
        detector.start_detection("c1", "dev", handler);

        let mut event = ContainerEvent::container("die", "c1", 1);
        event.kind = "network".to_string();
        assert!(!detector.process_event(&event));
        assert!(seen.lock().unwrap().is_empty());
        assert!(detector.is_tracking("c1"));
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_poison_detector() {
        let detector = detector();
        struct Panicking;
        impl AbnormalStopHandler for Panicking {
            fn handle(&self, _event: AbnormalStopEvent) {
                panic!("handler bug");
            }
        }

        detector.start_detection("c1", "dev", Arc::new(Panicking));
        let (second, seen) = recording_handler();
        detector.start_detection("c2", "dev", second);

        detector.process_event(&ContainerEvent::container("die", "c1", 1));
        detector.process_event(&ContainerEvent::container("die", "c2", 2));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
