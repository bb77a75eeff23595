//! Shared foundation for the workspace runtime control plane.
//!
//! Holds the error taxonomy used by every infrastructure-facing crate and the
//! naming convention that ties containers and networks back to workspaces.

pub mod error;
pub mod naming;

pub use error::{Result, WsError};
pub use naming::{ContainerNameInfo, NamingError};
