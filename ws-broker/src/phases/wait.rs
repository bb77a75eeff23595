use async_trait::async_trait;
use std::time::Duration;
use tracing::info;
use ws_core::Result;

use super::BrokerPhase;
use crate::context::BrokerContext;

/// Blocks until every broker reported, the timeout passes or the start is
/// interrupted.
pub struct WaitBrokerResult {
    timeout: Duration,
}

impl WaitBrokerResult {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl BrokerPhase for WaitBrokerResult {
    fn name(&self) -> &'static str {
        "wait-broker-result"
    }

    async fn execute(&self, ctx: &mut BrokerContext) -> Result<()> {
        let tooling = tokio::select! {
            result = ctx.result.wait(self.timeout) => result?,
            _ = ctx.synchronizer.interrupted() => {
                return Err(ctx.synchronizer.interrupted_error());
            }
        };

        info!(
            workspace = %ctx.workspace_id,
            plugins = tooling.len(),
            "Plugin brokers reported tooling"
        );
        ctx.tooling = Some(tooling);
        Ok(())
    }
}
