//! Container runtime abstraction.
//!
//! The control plane treats the container engine as a black box reached
//! through [`ContainerRuntime`]. The Docker CLI backed implementation lives in
//! [`docker`]; an in-memory [`mock::MockRuntime`] is available behind the
//! `test-helpers` feature.

use async_trait::async_trait;
use futures::stream::BoxStream;
use ws_core::Result;

pub mod model;

#[cfg(feature = "docker")]
pub mod docker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use model::{
    ContainerEvent, ContainerHandle, EventFilter, NetworkFilter, NetworkHandle, RemoveOptions,
};

/// Long-lived stream of runtime events. Ends when the underlying call ends.
pub type EventStream = BoxStream<'static, Result<ContainerEvent>>;

/// The operations the control plane needs from a container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Name of the engine (e.g. "docker").
    fn name(&self) -> &'static str;

    /// List all containers, running or not.
    async fn list_containers(&self) -> Result<Vec<ContainerHandle>>;

    /// Look up a single container. Missing containers yield `WsError::NotFound`.
    async fn inspect_container(&self, id: &str) -> Result<ContainerHandle>;

    async fn kill_container(&self, id: &str) -> Result<()>;

    async fn remove_container(&self, id: &str, options: RemoveOptions) -> Result<()>;

    /// List networks matching `filter`.
    ///
    /// `None` means the engine returned no list at all, which callers must
    /// treat the same as an empty one.
    async fn list_networks(&self, filter: &NetworkFilter) -> Result<Option<Vec<NetworkHandle>>>;

    async fn remove_network(&self, id: &str) -> Result<()>;

    /// Open an event stream starting at `since` (unix seconds, inclusive).
    async fn stream_events(&self, since: Option<i64>, filter: &EventFilter) -> Result<EventStream>;
}
