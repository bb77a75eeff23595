//! Resource quota algebra and admission control.
//!
//! Quotas are expressed as lists of [`Resource`] values whose semantics are
//! defined by pluggable [`ResourceType`]s registered once in a
//! [`ResourceTypeRegistry`]. The [`ResourceAggregator`] implements the list
//! algebra on top of them and the [`AdmissionController`] uses it to decide
//! whether an account may create or start another workspace.

pub mod admission;
pub mod aggregator;
pub mod error;
pub mod registry;
pub mod resource;
pub mod types;

pub use admission::{
    AccountLedger, AdmissionConfig, AdmissionController, Environment, EnvironmentRamCalculator,
    MachineConfig, MemoryLimitRamCalculator, WorkspaceConfig,
};
pub use aggregator::ResourceAggregator;
pub use error::{NoEnoughResources, ResourceError, Result};
pub use registry::ResourceTypeRegistry;
pub use resource::{Resource, UNLIMITED};
pub use types::{ExhaustibleResourceType, ResourceType, TimeoutResourceType};
