use std::sync::Arc;
use tokio::task::JoinHandle;
use ws_core::{Result, WsError};

use crate::model::{BrokerEnvironment, ChePlugin, StartOptions};
use crate::result::BrokersResult;
use crate::sync::StartSynchronizer;

/// State shared by the phases of one broker deployment.
///
/// Built fresh per deployment and never reused. Dropping the context stops
/// the event listener if one was started.
pub struct BrokerContext {
    pub workspace_id: String,
    pub namespace: String,
    pub environment: BrokerEnvironment,
    pub options: StartOptions,
    pub synchronizer: StartSynchronizer,
    pub result: Arc<BrokersResult>,
    /// Task feeding broker reports into `result`.
    pub listener: Option<JoinHandle<()>>,
    /// Names of the workloads created by the deploy phase.
    pub deployed: Vec<String>,
    pub tooling: Option<Vec<ChePlugin>>,
}

impl BrokerContext {
    /// Create the context and announce one broker per workload.
    pub fn new(
        workspace_id: &str,
        namespace: &str,
        environment: BrokerEnvironment,
        synchronizer: StartSynchronizer,
        options: StartOptions,
    ) -> Result<Self> {
        if environment.workloads.is_empty() {
            return Err(WsError::Config(format!(
                "Broker environment of workspace '{workspace_id}' declares no workloads"
            )));
        }

        let result = Arc::new(BrokersResult::new());
        for _ in &environment.workloads {
            result.one_more_broker()?;
        }

        Ok(Self {
            workspace_id: workspace_id.to_string(),
            namespace: namespace.to_string(),
            environment,
            options,
            synchronizer,
            result,
            listener: None,
            deployed: Vec::new(),
            tooling: None,
        })
    }

    pub fn stop_listening(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for BrokerContext {
    fn drop(&mut self) {
        self.stop_listening();
    }
}
