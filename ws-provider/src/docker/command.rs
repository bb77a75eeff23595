//! Docker command abstraction and builder utilities.
//!
//! Centralizes how the runtime shells out to the Docker CLI so every call gets
//! the same logging and the same mapping of failures onto [`WsError`].

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};
use ws_core::{Result, WsError};

/// Builder for Docker commands with a fluent interface.
#[derive(Debug, Clone)]
pub struct DockerCommand {
    binary: String,
    subcommand: Option<String>,
    args: Vec<String>,
}

impl DockerCommand {
    /// Create a new command run through `binary` (normally `docker`).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            subcommand: None,
            args: Vec::new(),
        }
    }

    /// Set the Docker subcommand (e.g. "ps", "network").
    pub fn subcommand<S: Into<String>>(mut self, cmd: S) -> Self {
        self.subcommand = Some(cmd.into());
        self
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `arg` only when `condition` holds.
    pub fn arg_if<S: Into<String>>(self, condition: bool, arg: S) -> Self {
        if condition {
            self.arg(arg)
        } else {
            self
        }
    }

    /// Execute the command and return stdout.
    ///
    /// A "No such ..." answer from the daemon becomes [`WsError::NotFound`];
    /// every other failure is an infrastructure error.
    pub async fn execute_with_output(self) -> Result<String> {
        let description = self.describe();
        let mut cmd = self.build_command();

        debug!("Executing Docker command: {}", description);

        let output = cmd.output().await.map_err(|e| {
            WsError::Infrastructure(format!("Failed to execute '{description}': {e}"))
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_missing_object(&stderr) {
            return Err(WsError::NotFound(stderr));
        }
        warn!("Docker command failed: {}: {}", description, stderr);
        Err(WsError::Infrastructure(format!(
            "'{description}' failed with status {}: {stderr}",
            output.status
        )))
    }

    /// Execute the command, discarding stdout.
    pub async fn execute(self) -> Result<()> {
        self.execute_with_output().await.map(|_| ())
    }

    /// Spawn a long-running command and hand back its stdout line by line.
    ///
    /// The child is killed when the returned handle is dropped.
    pub fn spawn_lines(self) -> Result<(Child, Lines<BufReader<ChildStdout>>)> {
        let description = self.describe();
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        debug!("Spawning Docker command: {}", description);

        let mut child = cmd.spawn().map_err(|e| {
            WsError::Infrastructure(format!("Failed to spawn '{description}': {e}"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            WsError::Infrastructure(format!("'{description}' has no stdout"))
        })?;

        Ok((child, BufReader::new(stdout).lines()))
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.binary.clone()];
        parts.extend(self.subcommand.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn build_command(self) -> Command {
        let mut cmd = Command::new(self.binary);

        if let Some(subcmd) = self.subcommand {
            cmd.arg(subcmd);
        }

        cmd.args(self.args);
        cmd
    }
}

fn is_missing_object(stderr: &str) -> bool {
    stderr.contains("No such container")
        || stderr.contains("No such network")
        || stderr.contains("No such object")
        || stderr.contains("not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_command_builder() {
        let cmd = DockerCommand::new("docker")
            .subcommand("rm")
            .arg_if(true, "-f")
            .arg_if(false, "-v")
            .arg("abc123");

        assert_eq!(cmd.subcommand.as_deref(), Some("rm"));
        assert_eq!(cmd.args, vec!["-f", "abc123"]);
        assert_eq!(cmd.describe(), "docker rm -f abc123");
    }

    #[test]
    fn test_missing_object_detection() {
        assert!(is_missing_object("Error response from daemon: No such container: abc"));
        assert!(is_missing_object("Error: No such network: workspace_net"));
        assert!(!is_missing_object("Cannot connect to the Docker daemon"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_infrastructure_error() {
        let err = DockerCommand::new("definitely-not-a-docker-binary")
            .subcommand("ps")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::Infrastructure(_)), "{err:?}");
    }
}
