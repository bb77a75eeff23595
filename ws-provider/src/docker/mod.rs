//! [`ContainerRuntime`] backed by the Docker CLI.
//!
//! Every call shells out through [`DockerCommand`] and parses the JSON the CLI
//! prints with `--format '{{json .}}'` (one object per line) or the JSON
//! arrays printed by `inspect`.

use crate::model::{
    ContainerEvent, ContainerHandle, EventFilter, NetworkFilter, NetworkHandle, RemoveOptions,
};
use crate::{ContainerRuntime, EventStream};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;
use ws_core::{Result, WsError};

pub mod command;

pub use command::DockerCommand;

const JSON_FORMAT: &str = "{{json .}}";

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerRuntime {
    /// `binary` may point at any Docker compatible CLI.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, subcommand: &str) -> DockerCommand {
        DockerCommand::new(self.binary.clone()).subcommand(subcommand)
    }

    /// Check that the daemon answers at all.
    pub async fn check_daemon_running(&self) -> Result<()> {
        self.command("info")
            .arg("--format")
            .arg("{{.ServerVersion}}")
            .execute()
            .await
            .map_err(|e| {
                WsError::Infrastructure(format!(
                    "Docker daemon is not running or not accessible: {e}"
                ))
            })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn list_containers(&self) -> Result<Vec<ContainerHandle>> {
        let output = self
            .command("ps")
            .args(["-a", "--no-trunc", "--format", JSON_FORMAT])
            .execute_with_output()
            .await?;

        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_ps_line)
            .collect()
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerHandle> {
        let output = self
            .command("container")
            .args(["inspect", id])
            .execute_with_output()
            .await?;

        let mut containers: Vec<InspectContainer> = serde_json::from_str(&output)?;
        if containers.is_empty() {
            return Err(WsError::NotFound(format!("container {id}")));
        }
        Ok(containers.swap_remove(0).into())
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        self.command("kill").arg(id).execute().await
    }

    async fn remove_container(&self, id: &str, options: RemoveOptions) -> Result<()> {
        self.command("rm")
            .arg_if(options.force, "--force")
            .arg_if(options.remove_volumes, "--volumes")
            .arg(id)
            .execute()
            .await
    }

    async fn list_networks(&self, filter: &NetworkFilter) -> Result<Option<Vec<NetworkHandle>>> {
        let ids = self
            .command("network")
            .args(["ls", "--no-trunc", "--quiet"])
            .arg_if(filter.custom_only, "--filter")
            .arg_if(filter.custom_only, "type=custom")
            .execute_with_output()
            .await?;

        let ids: Vec<&str> = ids.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if ids.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let output = self
            .command("network")
            .arg("inspect")
            .args(ids)
            .execute_with_output()
            .await?;

        let networks: Option<Vec<InspectNetwork>> = serde_json::from_str(&output)?;
        Ok(networks.map(|list| list.into_iter().map(Into::into).collect()))
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.command("network").args(["rm", id]).execute().await
    }

    async fn stream_events(&self, since: Option<i64>, filter: &EventFilter) -> Result<EventStream> {
        let mut cmd = self
            .command("events")
            .args(["--format", JSON_FORMAT])
            .arg("--filter")
            .arg(format!("type={}", filter.kind));
        for action in &filter.actions {
            cmd = cmd.arg("--filter").arg(format!("event={action}"));
        }
        if let Some(since) = since {
            cmd = cmd.arg("--since").arg(since.to_string());
        }

        let (child, lines) = cmd.spawn_lines()?;
        debug!(since = ?since, "Docker event stream opened");

        let stream = futures::stream::unfold(Some((child, lines)), |state| async move {
            let (child, mut lines) = state?;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => return Some((parse_event_line(&line), Some((child, lines)))),
                    Ok(None) => return None,
                    Err(e) => {
                        let err = WsError::Infrastructure(format!("event stream read failed: {e}"));
                        return Some((Err(err), None));
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Ports", default)]
    ports: String,
}

fn parse_ps_line(line: &str) -> Result<ContainerHandle> {
    let ps: PsLine = serde_json::from_str(line)?;
    Ok(ContainerHandle {
        id: ps.id,
        name: ps.names.split(',').next().unwrap_or_default().to_string(),
        status: ps.state,
        ports: ps
            .ports
            .split(", ")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
struct InspectContainer {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: InspectState,
    #[serde(rename = "NetworkSettings", default)]
    network_settings: Option<InspectNetworkSettings>,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct InspectNetworkSettings {
    #[serde(rename = "Ports", default)]
    ports: Option<HashMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Debug, Deserialize)]
struct PortBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

impl From<InspectContainer> for ContainerHandle {
    fn from(c: InspectContainer) -> Self {
        let mut ports: Vec<String> = c
            .network_settings
            .and_then(|s| s.ports)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|(container_port, bindings)| {
                bindings
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |b| format!("{}:{}->{}", b.host_ip, b.host_port, container_port))
            })
            .collect();
        ports.sort();

        ContainerHandle {
            id: c.id,
            name: c.name,
            status: c.state.status,
            ports,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InspectNetwork {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Scope", default)]
    scope: String,
    #[serde(rename = "Containers", default)]
    containers: Option<HashMap<String, serde_json::Value>>,
}

impl From<InspectNetwork> for NetworkHandle {
    fn from(n: InspectNetwork) -> Self {
        let mut containers: Vec<String> = n.containers.unwrap_or_default().into_keys().collect();
        containers.sort();
        NetworkHandle {
            id: n.id,
            name: n.name,
            scope: n.scope,
            containers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventLine {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "Actor", default)]
    actor: Option<EventActor>,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct EventActor {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}

fn parse_event_line(line: &str) -> Result<ContainerEvent> {
    let event: EventLine = serde_json::from_str(line)?;
    let (actor_id, attributes) = event
        .actor
        .map(|a| (a.id, a.attributes))
        .unwrap_or_default();

    // Older daemons only fill `status`/`id`, newer ones `Action`/`Actor`.
    let status = if event.action.is_empty() {
        event.status.unwrap_or_default()
    } else {
        event.action
    };
    let id = event.id.filter(|id| !id.is_empty()).unwrap_or(actor_id);

    Ok(ContainerEvent {
        kind: event.kind,
        status,
        id,
        time: event.time,
        attributes,
    })
}
