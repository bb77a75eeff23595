use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ws_core::Result;

/// Control-plane view of a workspace, as far as live infrastructure goes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub id: String,
    /// Ids of the machines the workspace's current runtime declares active.
    #[serde(default)]
    pub machines: Vec<String>,
}

impl WorkspaceInfo {
    pub fn has_active_machine(&self, machine_id: &str) -> bool {
        self.machines.iter().any(|m| m == machine_id)
    }
}

/// Read access to the control plane's workspace bookkeeping.
///
/// Implementations are queried fresh on every reconciliation pass; nothing
/// is cached between runs.
#[async_trait]
pub trait WorkspaceLedger: Send + Sync {
    /// Fails with `WsError::NotFound` for unknown workspaces.
    async fn get_workspace(&self, id: &str) -> Result<WorkspaceInfo>;

    async fn has_active_runtime(&self, workspace_id: &str) -> Result<bool>;
}
