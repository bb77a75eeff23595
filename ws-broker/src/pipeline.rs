use tracing::{debug, warn};
use ws_core::{Result, WsError};

use crate::context::BrokerContext;
use crate::model::ChePlugin;
use crate::phases::BrokerPhase;

/// Ordered phases of one broker deployment.
///
/// Consumed by [`execute`](BrokerPipeline::execute), so a pipeline runs once.
pub struct BrokerPipeline {
    phases: Vec<Box<dyn BrokerPhase>>,
}

impl BrokerPipeline {
    pub fn new(phases: Vec<Box<dyn BrokerPhase>>) -> Self {
        Self { phases }
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|phase| phase.name()).collect()
    }

    /// Run every phase in order and return the tooling the brokers reported.
    ///
    /// The first failing phase aborts the deployment; later phases never run.
    pub async fn execute(self, mut ctx: BrokerContext) -> Result<Vec<ChePlugin>> {
        for phase in &self.phases {
            debug!(workspace = %ctx.workspace_id, phase = phase.name(), "Executing broker phase");
            if let Err(e) = phase.execute(&mut ctx).await {
                warn!(
                    workspace = %ctx.workspace_id,
                    phase = phase.name(),
                    error = %e,
                    "Broker deployment aborted"
                );
                return Err(e);
            }
        }

        ctx.stop_listening();
        ctx.tooling.take().ok_or_else(|| {
            WsError::Infrastructure(format!(
                "Broker deployment of workspace '{}' finished without a result",
                ctx.workspace_id
            ))
        })
    }
}
