use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use ws_core::Result;

use super::BrokerPhase;
use crate::context::BrokerContext;
use crate::events::BrokerEventSource;
use crate::model::{BrokerEvent, BrokerStatus};
use crate::result::BrokersResult;

/// Subscribes to broker reports of the workspace and feeds them into the
/// deployment's [`BrokersResult`]. Must run before anything is deployed so no
/// early report is missed.
pub struct ListenBrokerEvents {
    source: Arc<dyn BrokerEventSource>,
}

impl ListenBrokerEvents {
    pub fn new(source: Arc<dyn BrokerEventSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl BrokerPhase for ListenBrokerEvents {
    fn name(&self) -> &'static str {
        "listen-broker-events"
    }

    async fn execute(&self, ctx: &mut BrokerContext) -> Result<()> {
        let mut rx = self.source.subscribe(&ctx.workspace_id);
        let workspace_id = ctx.workspace_id.clone();
        let result = Arc::clone(&ctx.result);

        ctx.listener = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply(&result, event);
                if result.is_complete() {
                    break;
                }
            }
            if !result.is_complete() {
                result.report_error("Broker event channel closed before brokers reported");
            }
            debug!(workspace = %workspace_id, "Broker event listener finished");
        }));
        Ok(())
    }
}

fn apply(result: &BrokersResult, event: BrokerEvent) {
    match event.status {
        BrokerStatus::Started => {
            info!(workspace = %event.workspace_id, "Plugin broker started");
        }
        BrokerStatus::Done => {
            let tooling = event.tooling.unwrap_or_default();
            info!(
                workspace = %event.workspace_id,
                plugins = tooling.len(),
                "Plugin broker finished"
            );
            result.report_done(tooling);
        }
        BrokerStatus::Failed => {
            let error = event
                .error
                .unwrap_or_else(|| "Plugin broker failed without an error message".to_string());
            warn!(workspace = %event.workspace_id, error = %error, "Plugin broker failed");
            result.report_error(error);
        }
    }
}
