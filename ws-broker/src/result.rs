//! Accumulator for broker reports of one deployment.

use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use ws_core::{Result, WsError};

use crate::model::ChePlugin;

#[derive(Debug, Clone)]
enum Outcome {
    Done(Vec<ChePlugin>),
    Failed(String),
}

#[derive(Debug, Default)]
struct ResultState {
    expected: usize,
    reported: usize,
    tooling: Vec<ChePlugin>,
    outcome: Option<Outcome>,
}

/// Collects tooling from every broker started for a deployment.
///
/// Completes once each broker announced through [`one_more_broker`] has
/// reported success, or as soon as one reports a failure. Reports arriving
/// after completion are ignored.
///
/// [`one_more_broker`]: BrokersResult::one_more_broker
#[derive(Debug)]
pub struct BrokersResult {
    state: watch::Sender<ResultState>,
}

impl Default for BrokersResult {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokersResult {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ResultState::default());
        Self { state }
    }

    /// Expect a report from one more broker.
    pub fn one_more_broker(&self) -> Result<()> {
        let mut rejected = false;
        self.state.send_if_modified(|state| {
            if state.outcome.is_some() {
                rejected = true;
                return false;
            }
            state.expected += 1;
            false
        });
        if rejected {
            return Err(WsError::Infrastructure(
                "Broker result is already complete, no more brokers can be added".to_string(),
            ));
        }
        Ok(())
    }

    pub fn expected_brokers(&self) -> usize {
        self.state.borrow().expected
    }

    pub fn is_complete(&self) -> bool {
        self.state.borrow().outcome.is_some()
    }

    pub fn report_done(&self, tooling: Vec<ChePlugin>) {
        self.state.send_if_modified(|state| {
            if state.outcome.is_some() {
                debug!("Ignoring broker result reported after completion");
                return false;
            }
            state.reported += 1;
            state.tooling.extend(tooling);
            if state.reported >= state.expected {
                state.outcome = Some(Outcome::Done(state.tooling.clone()));
                return true;
            }
            false
        });
    }

    pub fn report_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.state.send_if_modified(|state| {
            if state.outcome.is_some() {
                debug!(error = %error, "Ignoring broker error reported after completion");
                return false;
            }
            state.outcome = Some(Outcome::Failed(error));
            true
        });
    }

    /// Wait for completion for at most `timeout`.
    ///
    /// Timing out yields [`WsError::Timeout`]; a broker failure yields
    /// [`WsError::Infrastructure`] carrying the broker's message.
    pub async fn wait(&self, timeout: Duration) -> Result<Vec<ChePlugin>> {
        let mut rx = self.state.subscribe();
        let outcome = match tokio::time::timeout(timeout, async {
            rx.wait_for(|state| state.outcome.is_some())
                .await
                .map(|state| state.outcome.clone())
        })
        .await
        {
            Err(_) => {
                return Err(WsError::Timeout(format!(
                    "Plugin brokers did not report a result within {} seconds",
                    timeout.as_secs()
                )))
            }
            Ok(Err(_)) => {
                return Err(WsError::Infrastructure(
                    "Broker result channel closed".to_string(),
                ))
            }
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            Some(Outcome::Done(tooling)) => Ok(tooling),
            Some(Outcome::Failed(error)) => Err(WsError::Infrastructure(error)),
            None => Err(WsError::Infrastructure(
                "Broker result completed without an outcome".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(id: &str) -> ChePlugin {
        ChePlugin {
            id: id.to_string(),
            name: id.to_string(),
            version: "latest".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_single_broker_done() {
        let result = BrokersResult::new();
        result.one_more_broker().unwrap();
        result.report_done(vec![plugin("java")]);

        let tooling = result.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(tooling, vec![plugin("java")]);
    }

    #[tokio::test]
    async fn test_waits_for_every_broker() {
        let result = BrokersResult::new();
        result.one_more_broker().unwrap();
        result.one_more_broker().unwrap();

        result.report_done(vec![plugin("java")]);
        assert!(!result.is_complete());
        result.report_done(vec![plugin("node")]);
        assert!(result.is_complete());

        let tooling = result.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(tooling, vec![plugin("java"), plugin("node")]);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let result = BrokersResult::new();
        result.one_more_broker().unwrap();
        result.one_more_broker().unwrap();

        result.report_error("registry unreachable");
        result.report_done(vec![plugin("java")]);
        result.report_error("second failure");

        let err = result.wait(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, WsError::Infrastructure(ref m) if m == "registry unreachable"));
    }

    #[tokio::test]
    async fn test_no_brokers_after_completion() {
        let result = BrokersResult::new();
        result.one_more_broker().unwrap();
        result.report_done(Vec::new());
        assert!(result.one_more_broker().is_err());
        assert_eq!(result.expected_brokers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let result = BrokersResult::new();
        result.one_more_broker().unwrap();

        let err = result.wait(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_wakes_on_late_report() {
        let result = std::sync::Arc::new(BrokersResult::new());
        result.one_more_broker().unwrap();

        let reporter = std::sync::Arc::clone(&result);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            reporter.report_done(vec![plugin("go")]);
        });

        let tooling = result.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(tooling, vec![plugin("go")]);
    }
}
