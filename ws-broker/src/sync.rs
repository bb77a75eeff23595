use tokio_util::sync::CancellationToken;
use ws_core::{Result, WsError};

/// Shared between a workspace start and everything it spawns; interrupting
/// it aborts the start at the next check.
#[derive(Debug, Clone)]
pub struct StartSynchronizer {
    workspace_id: String,
    token: CancellationToken,
}

impl StartSynchronizer {
    pub fn new(workspace_id: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            token: CancellationToken::new(),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn interrupt(&self) {
        self.token.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn check_interrupted(&self) -> Result<()> {
        if self.is_interrupted() {
            return Err(self.interrupted_error());
        }
        Ok(())
    }

    /// Resolves once the start is interrupted.
    pub async fn interrupted(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn interrupted_error(&self) -> WsError {
        WsError::Infrastructure(format!(
            "Start of workspace '{}' was interrupted",
            self.workspace_id
        ))
    }
}
