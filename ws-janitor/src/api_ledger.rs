//! Workspace ledger backed by the workspace REST API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;
use ws_core::{Result, WsError};
use ws_runtime::{WorkspaceInfo, WorkspaceLedger};

#[derive(Debug, Deserialize)]
struct WorkspaceDto {
    id: String,
    #[serde(default)]
    runtime: Option<RuntimeDto>,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimeDto {
    #[serde(default)]
    machines: Vec<MachineDto>,
}

#[derive(Debug, Deserialize)]
struct MachineDto {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

impl MachineDto {
    /// Machines without a status are listed only while running.
    fn is_active(&self) -> bool {
        match self.status.as_deref() {
            None => true,
            Some(status) => {
                status.eq_ignore_ascii_case("running") || status.eq_ignore_ascii_case("starting")
            }
        }
    }
}

impl From<WorkspaceDto> for WorkspaceInfo {
    fn from(dto: WorkspaceDto) -> Self {
        let machines = dto
            .runtime
            .unwrap_or_default()
            .machines
            .into_iter()
            .filter(MachineDto::is_active)
            .map(|m| m.id)
            .collect();
        WorkspaceInfo {
            id: dto.id,
            machines,
        }
    }
}

pub struct ApiLedger {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl ApiLedger {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|e| WsError::Config(format!("Invalid API endpoint '{endpoint}': {e}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("ws-janitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn workspace_url(&self, id: &str) -> Result<Url> {
        self.endpoint
            .join(&format!("workspace/{id}"))
            .map_err(|e| WsError::Config(format!("Invalid workspace id '{id}': {e}")))
    }

    async fn fetch_workspace(&self, id: &str) -> Result<WorkspaceDto> {
        let url = self.workspace_url(id)?;
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WsError::Infrastructure(format!("Request to {url} failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(WsError::NotFound(format!("workspace {id}"))),
            status if status.is_success() => {
                let body = response.text().await.map_err(|e| {
                    WsError::Infrastructure(format!("Failed to read response from {url}: {e}"))
                })?;
                Ok(serde_json::from_str(&body)?)
            }
            status => Err(WsError::Infrastructure(format!(
                "Workspace API answered {status} for {url}"
            ))),
        }
    }
}

#[async_trait]
impl WorkspaceLedger for ApiLedger {
    async fn get_workspace(&self, id: &str) -> Result<WorkspaceInfo> {
        let workspace: WorkspaceInfo = self.fetch_workspace(id).await?.into();
        debug!(
            workspace = id,
            machines = workspace.machines.len(),
            "Fetched workspace"
        );
        Ok(workspace)
    }

    async fn has_active_runtime(&self, workspace_id: &str) -> Result<bool> {
        match self.fetch_workspace(workspace_id).await {
            Ok(workspace) => Ok(workspace.runtime.is_some()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_machines_are_kept() {
        let dto: WorkspaceDto = serde_json::from_str(
            r#"{
                "id": "workspace0123456789abcdef",
                "runtime": {"machines": [
                    {"id": "machineaaaaaaaaaaaaaaaa", "status": "RUNNING"},
                    {"id": "machinebbbbbbbbbbbbbbbb", "status": "STOPPED"},
                    {"id": "machinecccccccccccccccc"}
                ]}
            }"#,
        )
        .unwrap();

        let info = WorkspaceInfo::from(dto);
        assert_eq!(
            info.machines,
            vec!["machineaaaaaaaaaaaaaaaa", "machinecccccccccccccccc"]
        );
    }

    #[test]
    fn test_stopped_workspace_has_no_machines() {
        let dto: WorkspaceDto =
            serde_json::from_str(r#"{"id": "workspace0123456789abcdef", "status": "STOPPED"}"#)
                .unwrap();
        assert!(dto.runtime.is_none());
        assert!(WorkspaceInfo::from(dto).machines.is_empty());
    }

    #[test]
    fn test_workspace_url_keeps_base_path() {
        let ledger = ApiLedger::new("http://che:8080/api", None).unwrap();
        assert_eq!(
            ledger.workspace_url("workspace0123456789abcdef").unwrap().as_str(),
            "http://che:8080/api/workspace/workspace0123456789abcdef"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        assert!(matches!(
            ApiLedger::new("not a url", None),
            Err(WsError::Config(_))
        ));
    }
}
