//! Naming convention for workspace-owned infrastructure.
//!
//! Every container and network created for a workspace runtime embeds the
//! owning workspace id (and, for containers, the machine id) in its name. The
//! reconciler relies on these patterns to find its own resources, so they must
//! stay in sync with whatever created the containers.

// Standard library
use std::sync::OnceLock;

// External crates
use rand::Rng;
use regex::Regex;
use thiserror::Error;

pub const WORKSPACE_ID_PREFIX: &str = "workspace";
pub const MACHINE_ID_PREFIX: &str = "machine";
pub const ID_SUFFIX_LEN: usize = 16;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

static CONTAINER_NAME_RE: OnceLock<Regex> = OnceLock::new();
static NETWORK_NAME_RE: OnceLock<Regex> = OnceLock::new();
static WORKSPACE_ID_RE: OnceLock<Regex> = OnceLock::new();

fn container_name_regex() -> &'static Regex {
    CONTAINER_NAME_RE.get_or_init(|| {
        Regex::new(r"^/?(workspace[a-z0-9]{16})_(machine[a-z0-9]{16})_.+$")
            .expect("container name pattern is valid")
    })
}

fn network_name_regex() -> &'static Regex {
    NETWORK_NAME_RE.get_or_init(|| {
        Regex::new(r"^(workspace[a-z0-9]{16})_[a-z0-9]{16}$").expect("network name pattern is valid")
    })
}

fn workspace_id_regex() -> &'static Regex {
    WORKSPACE_ID_RE
        .get_or_init(|| Regex::new(r"^workspace[a-z0-9]{16}$").expect("workspace id pattern is valid"))
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("'{0}' is not a valid workspace id")]
    InvalidWorkspaceId(String),

    #[error("'{0}' is not a valid machine id")]
    InvalidMachineId(String),
}

/// Identifiers recovered from a workspace container name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerNameInfo {
    pub workspace_id: String,
    pub machine_id: String,
}

/// Parse a container name produced by [`container_name`].
///
/// Docker reports names with a leading `/`, which is accepted and ignored.
/// Returns `None` for containers that do not belong to a workspace.
pub fn parse_container_name(name: &str) -> Option<ContainerNameInfo> {
    let caps = container_name_regex().captures(name)?;
    Some(ContainerNameInfo {
        workspace_id: caps[1].to_string(),
        machine_id: caps[2].to_string(),
    })
}

/// Extract the workspace id embedded in a workspace network name.
pub fn parse_network_name(name: &str) -> Option<String> {
    network_name_regex()
        .captures(name)
        .map(|caps| caps[1].to_string())
}

pub fn is_workspace_id(id: &str) -> bool {
    workspace_id_regex().is_match(id)
}

/// Build the container name for a machine of a workspace.
///
/// Owner and machine name are lowercased and stripped of anything outside
/// `[a-z0-9_-]` so the result is always a valid Docker name.
pub fn container_name(
    workspace_id: &str,
    machine_id: &str,
    owner: &str,
    machine_name: &str,
) -> Result<String, NamingError> {
    if !is_workspace_id(workspace_id) {
        return Err(NamingError::InvalidWorkspaceId(workspace_id.to_string()));
    }
    if !is_machine_id(machine_id) {
        return Err(NamingError::InvalidMachineId(machine_id.to_string()));
    }

    let name = format!("{workspace_id}_{machine_id}_{owner}_{machine_name}").to_lowercase();
    Ok(name
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect())
}

/// Build a fresh network name for a workspace.
pub fn network_name(workspace_id: &str) -> Result<String, NamingError> {
    if !is_workspace_id(workspace_id) {
        return Err(NamingError::InvalidWorkspaceId(workspace_id.to_string()));
    }
    Ok(format!("{workspace_id}_{}", random_suffix()))
}

pub fn generate_workspace_id() -> String {
    format!("{WORKSPACE_ID_PREFIX}{}", random_suffix())
}

pub fn generate_machine_id() -> String {
    format!("{MACHINE_ID_PREFIX}{}", random_suffix())
}

fn is_machine_id(id: &str) -> bool {
    id.strip_prefix(MACHINE_ID_PREFIX).is_some_and(|suffix| {
        suffix.len() == ID_SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    })
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WS: &str = "workspace0123456789abcdef";
    const MACHINE: &str = "machine0123456789abcdef";

    #[test]
    fn test_parse_container_name_with_docker_slash() {
        let info = parse_container_name(&format!("/{WS}_{MACHINE}_alice_dev-machine"))
            .expect("should parse");
        assert_eq!(info.workspace_id, WS);
        assert_eq!(info.machine_id, MACHINE);
    }

    #[test]
    fn test_parse_container_name_rejects_foreign_containers() {
        assert!(parse_container_name("postgres").is_none());
        assert!(parse_container_name("workspaceSHORT_machine0123456789abcdef_a_b").is_none());
        assert!(parse_container_name(&format!("{WS}_{MACHINE}")).is_none());
    }

    #[test]
    fn test_container_name_round_trips_through_parser() {
        let name = container_name(WS, MACHINE, "Alice Smith", "Dev Machine!").unwrap();
        assert_eq!(name, format!("{WS}_{MACHINE}_alicesmith_devmachine"));
        let info = parse_container_name(&name).unwrap();
        assert_eq!(info.workspace_id, WS);
    }

    #[test]
    fn test_container_name_validates_ids() {
        assert_eq!(
            container_name("ws1", MACHINE, "a", "b"),
            Err(NamingError::InvalidWorkspaceId("ws1".into()))
        );
        assert_eq!(
            container_name(WS, "machine1", "a", "b"),
            Err(NamingError::InvalidMachineId("machine1".into()))
        );
    }

    #[test]
    fn test_network_name_matches_pattern() {
        let network = network_name(WS).unwrap();
        assert_eq!(parse_network_name(&network), Some(WS.to_string()));
        assert_eq!(parse_network_name("bridge"), None);
        assert_eq!(parse_network_name(&format!("{WS}_short")), None);
    }

    #[test]
    fn test_generated_ids_are_well_formed() {
        let ws = generate_workspace_id();
        assert!(is_workspace_id(&ws), "{ws}");
        assert!(is_machine_id(&generate_machine_id()));
    }
}
