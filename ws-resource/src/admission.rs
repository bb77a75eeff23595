//! Quota checks run before a workspace is created or started.
//!
//! The controller holds no bookkeeping of its own: available and used
//! resources come from an external [`AccountLedger`], and every check is a
//! single round trip followed by algebra on the returned lists.

use crate::aggregator::ResourceAggregator;
use crate::error::{NoEnoughResources, ResourceError, Result};
use crate::resource::{Resource, UNLIMITED};
use crate::types::{RAM, RUNTIME, WORKSPACE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const BYTES_IN_MB: u64 = 1024 * 1024;

/// Source of truth for what an account may still consume.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn available_resources(&self, account: &str) -> Result<Vec<Resource>>;

    async fn used_resources(&self, account: &str) -> Result<Vec<Resource>>;
}

/// Computes how much memory an environment needs, in bytes.
pub trait EnvironmentRamCalculator: Send + Sync {
    fn calculate(&self, environment: &Environment) -> Result<u64>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub memory_limit_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub machines: BTreeMap<String, MachineConfig>,
}

/// The part of a workspace configuration admission control looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,
    #[serde(default)]
    pub default_env: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

/// Sums machine memory limits, charging `default_machine_ram_bytes` for
/// machines that declare none.
#[derive(Debug, Clone)]
pub struct MemoryLimitRamCalculator {
    pub default_machine_ram_bytes: u64,
}

impl Default for MemoryLimitRamCalculator {
    fn default() -> Self {
        Self {
            default_machine_ram_bytes: 1024 * BYTES_IN_MB,
        }
    }
}

impl EnvironmentRamCalculator for MemoryLimitRamCalculator {
    fn calculate(&self, environment: &Environment) -> Result<u64> {
        environment
            .machines
            .values()
            .map(|m| m.memory_limit_bytes.unwrap_or(self.default_machine_ram_bytes))
            .try_fold(0u64, |total, bytes| total.checked_add(bytes))
            .ok_or_else(|| {
                ResourceError::Config("environment RAM does not fit in 64 bits".to_string())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Ceiling for the RAM of a single environment, in megabytes. `-1`
    /// disables the check.
    #[serde(default = "default_max_ram_per_env_mb")]
    pub max_ram_per_env_mb: i64,
}

fn default_max_ram_per_env_mb() -> i64 {
    UNLIMITED
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_ram_per_env_mb: default_max_ram_per_env_mb(),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionController {
    ledger: Arc<dyn AccountLedger>,
    ram_calculator: Arc<dyn EnvironmentRamCalculator>,
    aggregator: ResourceAggregator,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(
        ledger: Arc<dyn AccountLedger>,
        ram_calculator: Arc<dyn EnvironmentRamCalculator>,
        aggregator: ResourceAggregator,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            ledger,
            ram_calculator,
            aggregator,
            config,
        }
    }

    /// Fail with [`ResourceError::LimitExceeded`] unless the account can
    /// afford `required` right now.
    pub async fn check_availability(&self, account: &str, required: &[Resource]) -> Result<()> {
        let available = self.ledger.available_resources(account).await?;

        match self.aggregator.deduct(&available, required) {
            Ok(_) => Ok(()),
            Err(ResourceError::NoEnoughResources(shortfall)) => {
                let used = self.ledger.used_resources(account).await?;
                debug!(
                    account,
                    shortfall = %shortfall,
                    "Admission denied"
                );
                Err(ResourceError::LimitExceeded(limit_message(&shortfall, &used)))
            }
            Err(other) => Err(other),
        }
    }

    /// Check that the account has enough free RAM to start `env_name` (or the
    /// configuration's default environment).
    pub async fn check_ram_availability(
        &self,
        account: &str,
        namespace: &str,
        config: &WorkspaceConfig,
        env_name: Option<&str>,
    ) -> Result<()> {
        let env_name = env_name
            .or(config.default_env.as_deref())
            .ok_or_else(|| {
                ResourceError::Config(format!(
                    "workspace '{}' has no default environment",
                    config.name
                ))
            })?;
        let environment = config.environments.get(env_name).ok_or_else(|| {
            ResourceError::Config(format!(
                "environment '{env_name}' is not declared in workspace '{}'",
                config.name
            ))
        })?;

        let ram_bytes = self.ram_calculator.calculate(environment)?;
        let ram_mb = i64::try_from(ram_bytes.div_ceil(BYTES_IN_MB)).map_err(|_| {
            ResourceError::Config(format!("environment '{env_name}' needs {ram_bytes} bytes of RAM"))
        })?;
        debug!(account, namespace, env = env_name, ram_mb, "Checking RAM availability");

        let ram = self.aggregator.registry().require(RAM)?;
        let required = Resource::new(RAM, ram_mb, ram.default_unit());
        self.check_availability(account, &[required]).await
    }

    /// Reject configurations where any environment needs more RAM than the
    /// configured per-environment ceiling.
    pub fn check_max_environment_ram(&self, config: &WorkspaceConfig) -> Result<()> {
        let max_mb = self.config.max_ram_per_env_mb;
        if max_mb == UNLIMITED {
            return Ok(());
        }

        let max_bytes = u64::try_from(max_mb)
            .ok()
            .and_then(|mb| mb.checked_mul(BYTES_IN_MB))
            .ok_or_else(|| ResourceError::Config(format!("invalid RAM ceiling {max_mb}mb")))?;

        for (name, environment) in &config.environments {
            if self.ram_calculator.calculate(environment)? > max_bytes {
                debug!(workspace = %config.name, env = %name, max_mb, "Environment exceeds RAM ceiling");
                return Err(ResourceError::LimitExceeded(format!(
                    "You are only allowed to use {max_mb} mb. RAM per workspace."
                )));
            }
        }
        Ok(())
    }

    /// Check that the account may create one more workspace.
    pub async fn check_workspace_availability(&self, account: &str) -> Result<()> {
        let required = self.single_item(WORKSPACE)?;
        self.check_availability(account, &[required]).await
    }

    /// Check that the account may run one more workspace.
    pub async fn check_runtime_availability(&self, account: &str) -> Result<()> {
        let required = self.single_item(RUNTIME)?;
        self.check_availability(account, &[required]).await
    }

    fn single_item(&self, type_id: &str) -> Result<Resource> {
        let ty = self.aggregator.registry().require(type_id)?;
        Ok(Resource::new(type_id, 1, ty.default_unit()))
    }
}

fn find<'a>(resources: &'a [Resource], type_id: &str) -> Option<&'a Resource> {
    resources.iter().find(|r| r.type_id == type_id)
}

fn amount_or_zero(resources: &[Resource], template: &Resource) -> Resource {
    find(resources, &template.type_id)
        .cloned()
        .unwrap_or_else(|| Resource::new(template.type_id.clone(), 0, template.unit.clone()))
}

fn limit_message(shortfall: &NoEnoughResources, used: &[Resource]) -> String {
    let Some(missing) = shortfall.missing.first() else {
        return "Not enough resources".to_string();
    };

    match missing.type_id.as_str() {
        WORKSPACE => "You are not allowed to create more workspaces.".to_string(),
        RUNTIME => "You are not allowed to start more workspaces.".to_string(),
        _ => {
            let required = amount_or_zero(&shortfall.required, missing);
            let available = amount_or_zero(&shortfall.available, missing);
            let in_use = amount_or_zero(used, missing);
            format!(
                "Workspace needs {required} of {type_id} to start. Your account has {available} available and {in_use} in use. \
                 The workspace can't be started. Stop other workspaces or grant more resources.",
                type_id = missing.type_id
            )
        }
    }
}
