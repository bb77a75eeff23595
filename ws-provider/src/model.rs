use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const EVENT_TYPE_CONTAINER: &str = "container";
pub const ACTION_DIE: &str = "die";
pub const ACTION_OOM: &str = "oom";

/// A live container as reported by the runtime. Referenced, never owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    /// Engine state, e.g. `running`, `exited`, `created`.
    pub status: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

impl ContainerHandle {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub scope: String,
    /// Ids of the containers attached to the network.
    #[serde(default)]
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkFilter {
    /// Only user-defined networks, skipping the engine's built-in ones.
    pub custom_only: bool,
}

impl NetworkFilter {
    pub fn custom() -> Self {
        Self { custom_only: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    pub force: bool,
    pub remove_volumes: bool,
}

impl RemoveOptions {
    /// Force removal, volumes included.
    pub fn purge() -> Self {
        Self {
            force: true,
            remove_volumes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub kind: String,
    pub actions: Vec<String>,
}

impl EventFilter {
    pub fn container_actions(actions: &[&str]) -> Self {
        Self {
            kind: EVENT_TYPE_CONTAINER.to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// One entry of the runtime event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    /// Object type the event is about (`container`, `network`, ...).
    pub kind: String,
    /// What happened, e.g. `die` or `oom`.
    pub status: String,
    pub id: String,
    /// Unix seconds.
    pub time: i64,
    pub attributes: HashMap<String, String>,
}

impl ContainerEvent {
    pub fn container(status: &str, id: &str, time: i64) -> Self {
        Self {
            kind: EVENT_TYPE_CONTAINER.to_string(),
            status: status.to_string(),
            id: id.to_string(),
            time,
            attributes: HashMap::new(),
        }
    }

    pub fn is_container_event(&self) -> bool {
        self.kind == EVENT_TYPE_CONTAINER
    }
}
