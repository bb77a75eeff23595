//! Plugin broker deployment.
//!
//! A broker is a short-lived workload started inside a workspace runtime that
//! resolves the workspace's plugins and reports the resulting tooling back
//! over an event channel. [`PluginBrokerManager::get_tooling`] runs one
//! deployment as an ordered list of [`BrokerPhase`]s over a fresh
//! [`BrokerContext`]:
//!
//! 1. [`ListenBrokerEvents`] subscribes to broker reports before anything is deployed
//! 2. [`PrepareStorage`] provisions the volumes the broker needs
//! 3. [`DeployBroker`] creates the broker workloads
//! 4. [`WaitBrokerResult`] blocks until every broker reported, bounded by a timeout

pub mod config;
pub mod context;
pub mod events;
pub mod manager;
pub mod model;
pub mod phases;
pub mod pipeline;
pub mod result;
pub mod sync;

pub use config::BrokerConfig;
pub use context::BrokerContext;
pub use events::{BrokerEventBus, BrokerEventSource};
pub use manager::{PluginBrokerManager, StorageProvisioner, WorkloadDeployer};
pub use model::{
    BrokerEnvironment, BrokerEvent, BrokerStatus, BrokerWorkload, ChePlugin, PluginContainer,
    PluginEndpoint, StartOptions,
};
pub use phases::{BrokerPhase, DeployBroker, ListenBrokerEvents, PrepareStorage, WaitBrokerResult};
pub use pipeline::BrokerPipeline;
pub use result::BrokersResult;
pub use sync::StartSynchronizer;
