// crates/reward-audit-core/src/traits.rs

use async_trait::async_trait;

use crate::blob::{RuntimeCode, TierConfigBlob};
use crate::era::{BlockHash, BlockNumber, ChainEvent, EraNumber, ProtocolState};
use crate::error::AuditError;
use crate::reward::{DAppInfo, TierRewards};

/// Read access to the reward pallet and event log at one state root.
///
/// Implemented by chain snapshots (anchored to a historical block) and by
/// replay forks (anchored to the fork head).
#[async_trait]
pub trait StakingState: Send + Sync {
    /// The pallet's active protocol state.
    async fn protocol_state(&self) -> Result<ProtocolState, AuditError>;

    /// Tier table computed for `era`, or `None` if the pallet holds none.
    async fn tier_rewards(&self, era: EraNumber) -> Result<Option<TierRewards>, AuditError>;

    /// Every registered dApp.
    async fn dapp_directory(&self) -> Result<Vec<DAppInfo>, AuditError>;

    /// Events emitted by the block this state belongs to.
    async fn events(&self) -> Result<Vec<ChainEvent>, AuditError>;

    /// Raw tier threshold configuration, or `None` if unset.
    async fn tier_config(&self) -> Result<Option<TierConfigBlob>, AuditError>;
}

/// Historical (archive) access to the live chain.
///
/// Implemented by reward-audit-chain (subxt backend).
#[async_trait]
pub trait ChainReader: Send + Sync {
    type State: StakingState;

    /// Hash of the canonical block at `number`.
    async fn block_hash(&self, number: BlockNumber) -> Result<BlockHash, AuditError>;

    /// State snapshot anchored at `hash`.
    async fn state_at(&self, hash: BlockHash) -> Result<Self::State, AuditError>;

    /// Runtime code stored at `hash`.
    async fn runtime_code(&self, hash: BlockHash) -> Result<RuntimeCode, AuditError>;
}

/// Factory for isolated, mutable forks of chain state.
///
/// Implemented by reward-audit-chain (Chopsticks backend).
#[async_trait]
pub trait ForkBackend: Send + Sync {
    type Fork: ForkHandle;

    /// Materialise a fork whose head is block `number`.
    async fn open_fork(&self, number: BlockNumber) -> Result<Self::Fork, AuditError>;
}

/// One live replay fork. State reads observe the current fork head.
///
/// A fork must be released with [`ForkHandle::close`] before another fork
/// is opened.
#[async_trait]
pub trait ForkHandle: StakingState {
    /// Replace the fork's runtime code.
    async fn set_runtime(&self, code: &RuntimeCode) -> Result<(), AuditError>;

    /// Overwrite the tier threshold configuration storage entry.
    async fn override_tier_config(&self, config: &TierConfigBlob) -> Result<(), AuditError>;

    /// Build exactly one block on top of the fork head.
    async fn produce_block(&self) -> Result<(), AuditError>;

    /// Tear the fork down.
    async fn close(self) -> Result<(), AuditError>;
}
