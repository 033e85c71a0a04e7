// crates/reward-audit-chain/src/chopsticks.rs
//
// Replay forks backed by a Chopsticks process forking the live chain at a
// historical block.
//
// Each fork is one process group listening on a local port. Storage writes
// and block production go through the `dev_*` JSON-RPC methods; state reads
// use a subxt client connected to the same port and always observe the
// fork's current head.
//
// Launchers such as `npx` run the fork server as a grandchild, so teardown
// signals the whole group rather than the direct child.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;

use reward_audit_core::{
    AuditError, BlockNumber, ChainEvent, DAppInfo, EraNumber, ForkBackend, ForkHandle,
    ProtocolState, RuntimeCode, StakingState, TierConfigBlob, TierRewards,
};

use crate::dev_rpc::DevRpcClient;
use crate::substrate::{SubstrateClient, SubstrateState, CODE_KEY};

/// How to launch and reach the fork process.
#[derive(Debug, Clone)]
pub struct ChopsticksConfig {
    /// Archive endpoint the fork pulls state from.
    pub endpoint: String,
    /// Executable, e.g. `npx`.
    pub command: String,
    /// Leading arguments, e.g. `["@acala-network/chopsticks@latest"]`.
    pub args: Vec<String>,
    pub host: String,
    pub port: u16,
    /// Delay between readiness checks while the fork starts.
    pub poll_interval: Duration,
}

impl ChopsticksConfig {
    /// Full argument list for a fork at `block`.
    pub fn command_args(&self, block: BlockNumber) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "--endpoint".to_string(),
            self.endpoint.clone(),
            "--block".to_string(),
            block.to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ]);
        args
    }

    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Block number of a `chain_getHeader` result (`"number": "0x..."`).
pub fn header_number(header: &serde_json::Value) -> Result<BlockNumber, AuditError> {
    let raw = header
        .get("number")
        .and_then(|n| n.as_str())
        .ok_or_else(|| AuditError::Decode(format!("header has no block number: {}", header)))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    BlockNumber::from_str_radix(digits, 16)
        .map_err(|e| AuditError::Decode(format!("bad block number {:?}: {}", raw, e)))
}

/// A launched fork process and the process group it leads.
///
/// Dropping it kills the whole group.
pub struct ForkProcess {
    child: Child,
    pgid: Option<Pid>,
}

impl ForkProcess {
    /// Spawn `command args` as the leader of a new process group.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, AuditError> {
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AuditError::Fork(format!("failed to spawn `{}`: {}", command, e)))?;

        let pgid = child
            .id()
            .and_then(|pid| i32::try_from(pid).ok())
            .map(Pid::from_raw);
        Ok(Self { child, pgid })
    }

    /// Process group id; equal to the leader's pid.
    pub fn pgid(&self) -> Option<Pid> {
        self.pgid
    }

    /// Fail if the direct child has already exited.
    fn ensure_running(&mut self) -> Result<(), AuditError> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(AuditError::Fork(format!(
                "fork process exited before becoming ready ({})",
                status
            ))),
            Err(e) => Err(AuditError::Fork(format!("failed to poll fork process: {}", e))),
        }
    }

    fn kill_group(&mut self) -> Result<(), AuditError> {
        let Some(pgid) = self.pgid.take() else {
            return Ok(());
        };
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(AuditError::Fork(format!(
                "failed to stop fork process group {}: {}",
                pgid, e
            ))),
        }
    }

    /// Kill the group and reap the direct child.
    pub async fn shutdown(mut self) -> Result<(), AuditError> {
        self.kill_group()?;
        self.child
            .wait()
            .await
            .map_err(|e| AuditError::Fork(format!("failed to reap fork process: {}", e)))?;
        Ok(())
    }
}

impl Drop for ForkProcess {
    fn drop(&mut self) {
        if let Err(e) = self.kill_group() {
            tracing::warn!(error = %e, "Fork process group left running");
        }
    }
}

/// [`ForkBackend`] that spawns one Chopsticks process per fork.
///
/// Opening is not bounded here; callers wrap [`ForkBackend::open_fork`] in a
/// timeout. Dropping an unfinished open kills the process group.
pub struct ChopsticksBackend {
    config: ChopsticksConfig,
}

impl ChopsticksBackend {
    pub fn new(config: ChopsticksConfig) -> Self {
        Self { config }
    }

    /// Poll until the port serves a head at `block`.
    ///
    /// A head at any other block belongs to some other process holding the
    /// port and is an error.
    async fn wait_until_ready(
        &self,
        process: &mut ForkProcess,
        dev: &DevRpcClient,
        block: BlockNumber,
    ) -> Result<(), AuditError> {
        let mut attempts: u64 = 0;
        loop {
            process.ensure_running()?;

            match dev.call("chain_getHeader", json!([])).await {
                Ok(header) if header.is_null() => {
                    attempts += 1;
                }
                Ok(header) => {
                    let head = header_number(&header)?;
                    if head == block {
                        return Ok(());
                    }
                    return Err(AuditError::Fork(format!(
                        "port {} serves a chain at block {}, expected fork at {}",
                        self.config.port, head, block
                    )));
                }
                Err(e) => {
                    attempts += 1;
                    if attempts % 10 == 0 {
                        tracing::debug!(attempts, error = %e, "Fork not ready yet");
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl ForkBackend for ChopsticksBackend {
    type Fork = ChopsticksFork;

    async fn open_fork(&self, number: BlockNumber) -> Result<ChopsticksFork, AuditError> {
        let args = self.config.command_args(number);
        tracing::info!(
            block = number,
            command = %self.config.command,
            port = self.config.port,
            "Starting replay fork"
        );

        let mut process = ForkProcess::spawn(&self.config.command, &args)?;

        let dev = DevRpcClient::new(self.config.http_url());
        self.wait_until_ready(&mut process, &dev, number).await?;
        let client = SubstrateClient::connect(&self.config.ws_url()).await?;

        tracing::info!(block = number, url = %self.config.ws_url(), "Replay fork ready");
        Ok(ChopsticksFork {
            process,
            dev,
            ws_url: self.config.ws_url(),
            block: number,
            client: RwLock::new(client),
        })
    }
}

/// One running Chopsticks fork.
pub struct ChopsticksFork {
    process: ForkProcess,
    dev: DevRpcClient,
    ws_url: String,
    block: BlockNumber,
    client: RwLock<SubstrateClient>,
}

impl ChopsticksFork {
    /// Block the fork was started at.
    pub fn forked_at(&self) -> BlockNumber {
        self.block
    }

    async fn head(&self) -> Result<SubstrateState, AuditError> {
        let client = self.client.read().await;
        let hash = client.head_hash().await?;
        Ok(client.state(hash))
    }
}

#[async_trait]
impl StakingState for ChopsticksFork {
    async fn protocol_state(&self) -> Result<ProtocolState, AuditError> {
        self.head().await?.protocol_state().await
    }

    async fn tier_rewards(&self, era: EraNumber) -> Result<Option<TierRewards>, AuditError> {
        self.head().await?.tier_rewards(era).await
    }

    async fn dapp_directory(&self) -> Result<Vec<DAppInfo>, AuditError> {
        self.head().await?.dapp_directory().await
    }

    async fn events(&self) -> Result<Vec<ChainEvent>, AuditError> {
        self.head().await?.events().await
    }

    async fn tier_config(&self) -> Result<Option<TierConfigBlob>, AuditError> {
        self.head().await?.tier_config().await
    }
}

#[async_trait]
impl ForkHandle for ChopsticksFork {
    async fn set_runtime(&self, code: &RuntimeCode) -> Result<(), AuditError> {
        tracing::debug!(bytes = code.len(), "Installing runtime on fork");
        self.dev.set_storage(&[(CODE_KEY, code.as_bytes())]).await
    }

    async fn override_tier_config(&self, config: &TierConfigBlob) -> Result<(), AuditError> {
        let key = self.client.read().await.tier_config_key()?;
        tracing::debug!(bytes = config.len(), "Overriding tier config on fork");
        self.dev.set_storage(&[(key.as_slice(), config.as_bytes())]).await
    }

    async fn produce_block(&self) -> Result<(), AuditError> {
        let head = self.dev.new_block().await?;
        tracing::debug!(head = %head, "Fork produced block");

        // The installed runtime may carry different metadata.
        let refreshed = SubstrateClient::connect(&self.ws_url).await?;
        *self.client.write().await = refreshed;
        Ok(())
    }

    async fn close(self) -> Result<(), AuditError> {
        tracing::info!(block = self.block, "Stopping replay fork");
        self.process.shutdown().await
    }
}
