//! The steps of a broker deployment, in execution order.

mod deploy;
mod listen;
mod storage;
mod wait;

use async_trait::async_trait;
use ws_core::Result;

use crate::context::BrokerContext;

pub use deploy::DeployBroker;
pub use listen::ListenBrokerEvents;
pub use storage::PrepareStorage;
pub use wait::WaitBrokerResult;

/// One step of a broker deployment. An error aborts the deployment.
#[async_trait]
pub trait BrokerPhase: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut BrokerContext) -> Result<()>;
}
