use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use ws_core::Result;

use super::BrokerPhase;
use crate::context::BrokerContext;
use crate::manager::StorageProvisioner;

pub struct PrepareStorage {
    provisioner: Arc<dyn StorageProvisioner>,
}

impl PrepareStorage {
    pub fn new(provisioner: Arc<dyn StorageProvisioner>) -> Self {
        Self { provisioner }
    }
}

#[async_trait]
impl BrokerPhase for PrepareStorage {
    fn name(&self) -> &'static str {
        "prepare-storage"
    }

    async fn execute(&self, ctx: &mut BrokerContext) -> Result<()> {
        ctx.synchronizer.check_interrupted()?;

        self.provisioner
            .provision(
                &ctx.namespace,
                &ctx.environment,
                &ctx.synchronizer,
                &ctx.options,
            )
            .await?;
        debug!(
            workspace = %ctx.workspace_id,
            volumes = ctx.environment.volumes.len(),
            "Broker storage prepared"
        );

        ctx.synchronizer.check_interrupted()
    }
}
