//! Tests for the event-following loop of the stop detector.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use ws_core::WsError;
use ws_provider::mock::MockRuntime;
use ws_provider::ContainerEvent;
use ws_runtime::{AbnormalStopEvent, AbnormalStopHandler, StopDetector, StopDetectorConfig, StopReason};

fn channel_handler() -> (Arc<dyn AbnormalStopHandler>, mpsc::UnboundedReceiver<AbnormalStopEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: Arc<dyn AbnormalStopHandler> = Arc::new(move |event: AbnormalStopEvent| {
        let _ = tx.send(event);
    });
    (handler, rx)
}

fn config() -> StopDetectorConfig {
    StopDetectorConfig {
        oom_marker_ttl_secs: 10,
        retry_delay_ms: 10,
    }
}

#[tokio::test]
async fn test_loop_dispatches_and_resumes_from_last_event() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.push_events(vec![
        Ok(ContainerEvent::container("oom", "c1", 100)),
        Ok(ContainerEvent::container("die", "c1", 101)),
    ]);
    runtime.push_events(vec![Ok(ContainerEvent::container("die", "c2", 205))]);

    let detector = Arc::new(StopDetector::new(runtime.clone(), config()));
    let (h1, mut rx1) = channel_handler();
    let (h2, mut rx2) = channel_handler();
    detector.start_detection("c1", "dev-machine", h1);
    detector.start_detection("c2", "db", h2);

    let task = detector.spawn();

    let first = tokio::time::timeout(Duration::from_secs(5), rx1.recv())
        .await
        .expect("c1 should be reported")
        .unwrap();
    assert_eq!(first.reason, StopReason::OomOfMainProcess);

    let second = tokio::time::timeout(Duration::from_secs(5), rx2.recv())
        .await
        .expect("c2 should be reported")
        .unwrap();
    assert_eq!(second.reason, StopReason::UnexpectedExit);

    // Third call opens the never-ending stream; wait until it was made.
    for _ in 0..100 {
        if runtime.event_cursors().len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(runtime.event_cursors(), vec![None, Some(101), Some(205)]);
    assert!(!task.is_finished());
    task.abort();
}

#[tokio::test]
async fn test_loop_survives_open_and_stream_errors() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.push_open_error("daemon restarting");
    runtime.push_events(vec![
        Ok(ContainerEvent::container("oom", "c1", 50)),
        Err(WsError::Infrastructure("connection reset".into())),
        Ok(ContainerEvent::container("die", "c1", 51)),
    ]);
    runtime.push_events(vec![Ok(ContainerEvent::container("die", "c1", 52))]);

    let detector = Arc::new(StopDetector::new(runtime.clone(), config()));
    let (handler, mut rx) = channel_handler();
    detector.start_detection("c1", "dev-machine", handler);

    let task = detector.spawn();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("c1 should be reported after the stream recovered")
        .unwrap();
    // The die arrives on the reopened stream while the marker is still fresh.
    assert_eq!(event.reason, StopReason::OomOfMainProcess);

    let cursors = runtime.event_cursors();
    assert_eq!(&cursors[..3], &[None, None, Some(50)]);
    task.abort();
}
