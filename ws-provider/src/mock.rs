//! In-memory runtime for tests.
//!
//! Records every call, lets tests script failures per container/network and
//! feeds scripted event batches to `stream_events`. Once the scripted batches
//! run out, new event streams stay open forever without yielding.

use crate::model::{
    ContainerEvent, ContainerHandle, EventFilter, NetworkFilter, NetworkHandle, RemoveOptions,
};
use crate::{ContainerRuntime, EventStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use ws_core::{Result, WsError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    ListContainers,
    Inspect(String),
    Kill(String),
    Remove { id: String, options: RemoveOptions },
    ListNetworks(NetworkFilter),
    RemoveNetwork(String),
    StreamEvents { since: Option<i64> },
}

/// What the next `stream_events` call does.
#[derive(Debug)]
pub enum EventScript {
    /// Yield these items, then end the stream.
    Batch(Vec<Result<ContainerEvent>>),
    /// Fail to open the stream.
    OpenError(String),
}

#[derive(Debug, Default)]
struct MockState {
    containers: Vec<ContainerHandle>,
    networks: Option<Vec<NetworkHandle>>,
    calls: Vec<RuntimeCall>,
    scripts: VecDeque<EventScript>,
    failing_ids: HashSet<String>,
    list_containers_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_container(&self, id: &str, name: &str, status: &str) {
        self.state().containers.push(ContainerHandle {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
            ports: Vec::new(),
        });
    }

    /// Replace the network list; `None` mimics an engine answering with null.
    pub fn set_networks(&self, networks: Option<Vec<NetworkHandle>>) {
        self.state().networks = networks;
    }

    pub fn add_network(&self, id: &str, name: &str, containers: &[&str]) {
        self.state()
            .networks
            .get_or_insert_with(Vec::new)
            .push(NetworkHandle {
                id: id.to_string(),
                name: name.to_string(),
                scope: "local".to_string(),
                containers: containers.iter().map(|c| c.to_string()).collect(),
            });
    }

    /// Make every kill/remove/inspect of `id` fail with an infrastructure error.
    pub fn fail_operations_on(&self, id: &str) {
        self.state().failing_ids.insert(id.to_string());
    }

    pub fn fail_list_containers(&self, message: &str) {
        self.state().list_containers_error = Some(message.to_string());
    }

    pub fn push_events(&self, events: Vec<Result<ContainerEvent>>) {
        self.state().scripts.push_back(EventScript::Batch(events));
    }

    pub fn push_open_error(&self, message: &str) {
        self.state()
            .scripts
            .push_back(EventScript::OpenError(message.to_string()));
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state().calls.clone()
    }

    pub fn killed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::Kill(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::Remove { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn removed_networks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::RemoveNetwork(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// The `since` cursor of every `stream_events` call, in order.
    pub fn event_cursors(&self) -> Vec<Option<i64>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::StreamEvents { since } => Some(since),
                _ => None,
            })
            .collect()
    }

    pub fn containers(&self) -> Vec<ContainerHandle> {
        self.state().containers.clone()
    }

    fn check_failing(state: &MockState, id: &str) -> Result<()> {
        if state.failing_ids.contains(id) {
            return Err(WsError::Infrastructure(format!("scripted failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_containers(&self) -> Result<Vec<ContainerHandle>> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::ListContainers);
        if let Some(message) = &state.list_containers_error {
            return Err(WsError::Infrastructure(message.clone()));
        }
        Ok(state.containers.clone())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerHandle> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::Inspect(id.to_string()));
        Self::check_failing(&state, id)?;
        state
            .containers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| WsError::NotFound(format!("container {id}")))
    }

    async fn kill_container(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::Kill(id.to_string()));
        Self::check_failing(&state, id)?;
        match state.containers.iter_mut().find(|c| c.id == id) {
            Some(container) => {
                container.status = "exited".to_string();
                Ok(())
            }
            None => Err(WsError::NotFound(format!("container {id}"))),
        }
    }

    async fn remove_container(&self, id: &str, options: RemoveOptions) -> Result<()> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::Remove {
            id: id.to_string(),
            options,
        });
        Self::check_failing(&state, id)?;

        let before = state.containers.len();
        state.containers.retain(|c| c.id != id);
        if state.containers.len() == before {
            return Err(WsError::NotFound(format!("container {id}")));
        }
        if let Some(networks) = state.networks.as_mut() {
            for network in networks {
                network.containers.retain(|c| c != id);
            }
        }
        Ok(())
    }

    async fn list_networks(&self, filter: &NetworkFilter) -> Result<Option<Vec<NetworkHandle>>> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::ListNetworks(*filter));
        Ok(state.networks.clone())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::RemoveNetwork(id.to_string()));
        Self::check_failing(&state, id)?;
        if let Some(networks) = state.networks.as_mut() {
            networks.retain(|n| n.id != id);
        }
        Ok(())
    }

    async fn stream_events(&self, since: Option<i64>, _filter: &EventFilter) -> Result<EventStream> {
        let mut state = self.state();
        state.calls.push(RuntimeCall::StreamEvents { since });
        match state.scripts.pop_front() {
            Some(EventScript::Batch(events)) => Ok(futures::stream::iter(events).boxed()),
            Some(EventScript::OpenError(message)) => Err(WsError::Infrastructure(message)),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}
