// crates/reward-audit-cli/src/config.rs
//
// Runtime configuration for the audit.
// Loaded from a TOML file or populated with defaults; CLI flags override.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use reward_audit_chain::ChopsticksConfig;
use reward_audit_core::{AuditError, BlockNumber};
use reward_audit_engine::{AuditRange, ReplaySettings};

/// Top-level audit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Archive node WebSocket URL.
    #[serde(default)]
    pub endpoint: String,

    /// Block at which the initial protocol state is read.
    #[serde(default)]
    pub start_block: BlockNumber,

    /// Exclusive upper bound for era boundaries; the corrected runtime is
    /// taken from this block.
    #[serde(default)]
    pub end_block: BlockNumber,

    /// Directory receiving scan snapshots and reimbursement artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub fork: ForkConfig,
}

/// Replay fork launch and pacing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ForkConfig {
    #[serde(default = "default_fork_command")]
    pub command: String,

    #[serde(default = "default_fork_args")]
    pub args: Vec<String>,

    #[serde(default = "default_fork_host")]
    pub host: String,

    #[serde(default = "default_fork_port")]
    pub port: u16,

    /// Upper bound on acquiring a ready fork.
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Pause between consecutive forks.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_output_dir() -> String {
    "./reimbursement".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fork_command() -> String {
    "npx".to_string()
}

fn default_fork_args() -> Vec<String> {
    vec!["@acala-network/chopsticks@latest".to_string()]
}

fn default_fork_host() -> String {
    "127.0.0.1".to_string()
}

fn default_fork_port() -> u16 {
    8000
}

fn default_open_timeout_secs() -> u64 {
    300
}

fn default_settle_delay_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            start_block: 0,
            end_block: 0,
            output_dir: default_output_dir(),
            log_level: default_log_level(),
            fork: ForkConfig::default(),
        }
    }
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            command: default_fork_command(),
            args: default_fork_args(),
            host: default_fork_host(),
            port: default_fork_port(),
            open_timeout_secs: default_open_timeout_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AuditConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, AuditError> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, AuditError> {
        toml::from_str(contents).map_err(|e| AuditError::Config(e.to_string()))
    }

    /// Settings every command needs regardless of where the scan comes from.
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.endpoint.trim().is_empty() {
            return Err(AuditError::Config("endpoint is not set".to_string()));
        }
        if self.fork.command.trim().is_empty() {
            return Err(AuditError::Config("fork.command is not set".to_string()));
        }
        Ok(())
    }

    /// Block range to scan.
    pub fn range(&self) -> Result<AuditRange, AuditError> {
        AuditRange::new(self.start_block, self.end_block)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(expand_tilde(&self.output_dir))
    }

    pub fn replay_settings(&self) -> ReplaySettings {
        ReplaySettings {
            open_timeout: Duration::from_secs(self.fork.open_timeout_secs),
            settle_delay: Duration::from_secs(self.fork.settle_delay_secs),
        }
    }

    pub fn chopsticks_config(&self) -> ChopsticksConfig {
        ChopsticksConfig {
            endpoint: self.endpoint.clone(),
            command: self.fork.command.clone(),
            args: self.fork.args.clone(),
            host: self.fork.host.clone(),
            port: self.fork.port,
            poll_interval: Duration::from_millis(self.fork.poll_interval_ms),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
