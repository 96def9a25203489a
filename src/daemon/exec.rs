//! Command execution boundary for the VPN daemon CLI.
//!
//! Everything the controller knows about the daemon arrives through
//! [`CommandRunner::run`], so tests can swap in a scripted daemon and the
//! status parser can be exercised against captured output.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a successful daemon command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command '{command}' timed out after {}s", timeout.as_secs_f32())]
    TimedOut { command: String, timeout: Duration },
    #[error("command '{command}' could not be started: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command '{command}' failed ({status}) (stderr: {stderr}, stdout: {stdout})")]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },
}

/// Runs one daemon CLI invocation (`status`, `connect <city>`, ...) with a
/// per-command time bound.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput, CommandError>;
}

/// Runs the daemon CLI as a child process, optionally inside a container.
#[derive(Debug, Clone)]
pub struct DaemonRunner {
    binary: String,
    container: Option<String>,
}

impl DaemonRunner {
    pub fn new(binary: impl Into<String>, container: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            container: container.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Full argv for a daemon invocation.
    pub fn argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 4);
        if let Some(ref container) = self.container {
            argv.push("docker".to_string());
            argv.push("exec".to_string());
            argv.push(container.clone());
        }
        argv.push(self.binary.clone());
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }
}

#[async_trait]
impl CommandRunner for DaemonRunner {
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput, CommandError> {
        let argv = self.argv(args);
        let cmdline = argv.join(" ");
        debug!(command = %cmdline, timeout_ms = timeout.as_millis() as u64, "running daemon command");

        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: cmdline.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Spawn {
                    command: cmdline,
                    source,
                })
            }
            Err(_) => {
                return Err(CommandError::TimedOut {
                    command: cmdline,
                    timeout,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: cmdline,
                status: output.status.to_string(),
                stdout: or_na(stdout.trim()),
                stderr: or_na(stderr.trim()),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

fn or_na(s: &str) -> String {
    if s.is_empty() {
        "N/A".to_string()
    } else {
        s.to_string()
    }
}
