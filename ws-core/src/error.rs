use thiserror::Error;

/// Errors raised while talking to the container runtime or the control plane.
#[derive(Error, Debug)]
pub enum WsError {
    /// A runtime API call (container, network, event stream, workload) failed.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// A bounded wait ran out of time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Workspace or machine lookup miss. Expected during reconciliation.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl WsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WsError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WsError::Timeout(_))
    }
}

impl From<serde_json::Error> for WsError {
    fn from(err: serde_json::Error) -> Self {
        WsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WsError>;
