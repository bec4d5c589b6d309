//! MCP server process lifecycle (spawn, stdio, shutdown).

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Environment variable the MySQL MCP server checks before allowing writes.
pub const ALLOW_WRITES_ENV: &str = "ALLOW_WRITE_OPERATIONS";

/// Default time a server gets to exit after its stdin is closed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Configuration for an MCP server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Set `ALLOW_WRITE_OPERATIONS=true` in the child's environment.
    pub allow_writes: bool,
    /// Pass the child's stderr through instead of discarding it.
    pub inherit_stderr: bool,
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            allow_writes: true,
            inherit_stderr: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Stdio handles of a running server.
pub type ServerStdio = (ChildStdin, BufReader<ChildStdout>);

/// Sole owner of a running MCP server process.
///
/// The child is spawned with kill-on-drop, so it cannot outlive this handle
/// even if [`ServerProcess::cleanup`] is never reached.
pub struct ServerProcess {
    config: ServerConfig,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    exit: Option<ExitStatus>,
    cleaned_up: bool,
}

impl ServerProcess {
    /// Spawn the server with piped stdin/stdout.
    pub fn start(config: ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if config.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        if config.allow_writes {
            cmd.env(ALLOW_WRITES_ENV, "true");
        }

        let mut process = cmd.spawn().map_err(|source| Error::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let stdin = process.stdin.take().ok_or(Error::StdioTaken)?;
        let stdout = process.stdout.take().ok_or(Error::StdioTaken)?;

        info!(
            command = %config.command,
            pid = process.id(),
            allow_writes = config.allow_writes,
            "started MCP server"
        );

        Ok(Self {
            config,
            process,
            stdin: Some(stdin),
            stdout: Some(stdout),
            exit: None,
            cleaned_up: false,
        })
    }

    /// OS process id, while the child has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    /// Hand out the stdio pipes. Only the first call succeeds.
    pub fn take_stdio(&mut self) -> Result<ServerStdio> {
        match (self.stdin.take(), self.stdout.take()) {
            (Some(stdin), Some(stdout)) => Ok((stdin, BufReader::new(stdout))),
            _ => Err(Error::StdioTaken),
        }
    }

    /// Check if the server process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }

    /// Stop the server and wait for it to exit.
    ///
    /// Closes stdin if we still hold it, gives the server the configured grace
    /// period to exit on its own, then kills it. Calling this again returns the
    /// status from the first call.
    ///
    /// Callers that took the stdio handles must drop the stdin half first,
    /// otherwise the server only sees the kill.
    pub async fn cleanup(&mut self) -> Result<Option<ExitStatus>> {
        if self.cleaned_up {
            return Ok(self.exit);
        }
        self.cleaned_up = true;

        drop(self.stdin.take());
        drop(self.stdout.take());

        let status = match timeout(self.config.shutdown_grace, self.process.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                debug!(
                    grace = ?self.config.shutdown_grace,
                    "server did not exit after stdin closed, killing"
                );
                self.process.kill().await?;
                self.process.wait().await?
            }
        };

        info!(command = %self.config.command, %status, "MCP server stopped");
        self.exit = Some(status);
        Ok(self.exit)
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if !self.cleaned_up {
            warn!(
                command = %self.config.command,
                "server dropped without cleanup, killing"
            );
            let _ = self.process.start_kill();
        }
    }
}
