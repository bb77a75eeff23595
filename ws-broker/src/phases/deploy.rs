use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use ws_core::Result;

use super::BrokerPhase;
use crate::context::BrokerContext;
use crate::manager::WorkloadDeployer;

pub struct DeployBroker {
    deployer: Arc<dyn WorkloadDeployer>,
}

impl DeployBroker {
    pub fn new(deployer: Arc<dyn WorkloadDeployer>) -> Self {
        Self { deployer }
    }
}

#[async_trait]
impl BrokerPhase for DeployBroker {
    fn name(&self) -> &'static str {
        "deploy-broker"
    }

    async fn execute(&self, ctx: &mut BrokerContext) -> Result<()> {
        let deployed = self
            .deployer
            .deploy(&ctx.namespace, &ctx.environment)
            .await?;
        info!(
            workspace = %ctx.workspace_id,
            namespace = %ctx.namespace,
            workloads = %deployed.join(", "),
            "Plugin broker deployed"
        );
        ctx.deployed = deployed;
        Ok(())
    }
}
