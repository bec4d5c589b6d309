//! Configuration loading from mcp-smoke.toml.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use harness::{DEFAULT_PREVIEW_CHARS, DEFAULT_TABLE_PREFIX, RunOptions, validate_prefix};
use mcp::ServerConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub run: RunSection,
}

/// How to launch the server under test.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the server (database credentials and such).
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub allow_writes: bool,

    /// Show the server's stderr on the console.
    #[serde(default)]
    pub inherit_stderr: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
            allow_writes: true,
            inherit_stderr: false,
        }
    }
}

/// Timeouts, in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
            startup_delay_ms: default_startup_delay_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_command() -> String {
    "mysql-mcp-server".to_string()
}

fn default_true() -> bool {
    true
}

fn default_response_timeout_ms() -> u64 {
    mcp::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_startup_delay_ms() -> u64 {
    1000
}

fn default_shutdown_grace_ms() -> u64 {
    mcp::DEFAULT_SHUTDOWN_GRACE.as_millis() as u64
}

fn default_table_prefix() -> String {
    DEFAULT_TABLE_PREFIX.to_string()
}

fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot make a sensible run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.command.trim().is_empty() {
            return Err(ConfigError::Invalid("server.command is empty".to_string()));
        }
        if self.client.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "client.response_timeout_ms must be greater than 0".to_string(),
            ));
        }
        validate_prefix(&self.run.table_prefix)
            .map_err(|e| ConfigError::Invalid(format!("run.table_prefix: {e}")))?;
        Ok(())
    }

    /// Build the process configuration for the server under test.
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(&self.server.command);
        config.args = self.server.args.clone();
        config.env = self.server.env.clone();
        config.allow_writes = self.server.allow_writes;
        config.inherit_stderr = self.server.inherit_stderr;
        config.shutdown_grace = Duration::from_millis(self.client.shutdown_grace_ms);
        config
    }

    /// Build the runner options.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            response_timeout: Duration::from_millis(self.client.response_timeout_ms),
            startup_delay: Duration::from_millis(self.client.startup_delay_ms),
            preview_chars: self.run.preview_chars,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
