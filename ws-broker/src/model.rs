use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tooling resolved by a broker for one plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChePlugin {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub containers: Vec<PluginContainer>,
    #[serde(default)]
    pub endpoints: Vec<PluginEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginContainer {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginEndpoint {
    pub name: String,
    pub target_port: u16,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerStatus {
    Started,
    Done,
    Failed,
}

/// Status report published by a broker workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerEvent {
    pub workspace_id: String,
    pub status: BrokerStatus,
    #[serde(default)]
    pub tooling: Option<Vec<ChePlugin>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BrokerEvent {
    pub fn started(workspace_id: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            status: BrokerStatus::Started,
            tooling: None,
            error: None,
        }
    }

    pub fn done(workspace_id: &str, tooling: Vec<ChePlugin>) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            status: BrokerStatus::Done,
            tooling: Some(tooling),
            error: None,
        }
    }

    pub fn failed(workspace_id: &str, error: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            status: BrokerStatus::Failed,
            tooling: None,
            error: Some(error.to_string()),
        }
    }
}

/// One broker workload to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerWorkload {
    pub name: String,
    pub image: String,
    /// Plugin references the broker resolves, e.g. `publisher/name/version`.
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Pre-provisioned descriptor of the broker workloads for one deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerEnvironment {
    pub workloads: Vec<BrokerWorkload>,
    /// Volumes the workloads mount; provisioned before deployment.
    #[serde(default)]
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Storage does not outlive the runtime.
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_event_wire_format() {
        let json = r#"{
            "workspaceId": "workspace0123456789abcdef",
            "status": "DONE",
            "tooling": [{"id": "redhat/java/latest", "name": "java", "version": "latest",
                         "endpoints": [{"name": "debug", "targetPort": 5005}]}]
        }"#;
        let event: BrokerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.status, BrokerStatus::Done);
        let tooling = event.tooling.unwrap();
        assert_eq!(tooling[0].endpoints[0].target_port, 5005);
        assert!(!tooling[0].endpoints[0].public);
        assert!(event.error.is_none());
    }
}
