use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use ws_core::Result;

use crate::config::BrokerConfig;
use crate::context::BrokerContext;
use crate::events::BrokerEventSource;
use crate::model::{BrokerEnvironment, ChePlugin, StartOptions};
use crate::phases::{
    BrokerPhase, DeployBroker, ListenBrokerEvents, PrepareStorage, WaitBrokerResult,
};
use crate::pipeline::BrokerPipeline;
use crate::sync::StartSynchronizer;

/// Provisions the volumes broker workloads mount.
#[async_trait]
pub trait StorageProvisioner: Send + Sync {
    async fn provision(
        &self,
        namespace: &str,
        environment: &BrokerEnvironment,
        synchronizer: &StartSynchronizer,
        options: &StartOptions,
    ) -> Result<()>;
}

/// Creates broker workloads in the runtime.
#[async_trait]
pub trait WorkloadDeployer: Send + Sync {
    /// Returns the names of the created workloads.
    async fn deploy(&self, namespace: &str, environment: &BrokerEnvironment)
        -> Result<Vec<String>>;
}

/// Entry point for resolving a workspace's tooling through plugin brokers.
pub struct PluginBrokerManager {
    events: Arc<dyn BrokerEventSource>,
    storage: Arc<dyn StorageProvisioner>,
    deployer: Arc<dyn WorkloadDeployer>,
    config: BrokerConfig,
}

impl PluginBrokerManager {
    pub fn new(
        events: Arc<dyn BrokerEventSource>,
        storage: Arc<dyn StorageProvisioner>,
        deployer: Arc<dyn WorkloadDeployer>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            events,
            storage,
            deployer,
            config,
        }
    }

    /// The phases of a new deployment, in order.
    pub fn pipeline(&self) -> BrokerPipeline {
        let phases: Vec<Box<dyn BrokerPhase>> = vec![
            Box::new(ListenBrokerEvents::new(Arc::clone(&self.events))),
            Box::new(PrepareStorage::new(Arc::clone(&self.storage))),
            Box::new(DeployBroker::new(Arc::clone(&self.deployer))),
            Box::new(WaitBrokerResult::new(self.config.wait_timeout())),
        ];
        BrokerPipeline::new(phases)
    }

    /// Deploy the brokers described by `environment` and return the tooling
    /// they resolved.
    pub async fn get_tooling(
        &self,
        workspace_id: &str,
        namespace: &str,
        environment: BrokerEnvironment,
        synchronizer: StartSynchronizer,
        options: StartOptions,
    ) -> Result<Vec<ChePlugin>> {
        info!(
            workspace = workspace_id,
            brokers = environment.workloads.len(),
            "Resolving workspace tooling"
        );
        let ctx = BrokerContext::new(workspace_id, namespace, environment, synchronizer, options)?;
        self.pipeline().execute(ctx).await
    }
}
