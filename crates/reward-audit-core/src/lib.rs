// crates/reward-audit-core/src/lib.rs
//
// reward-audit-core: Core types, error taxonomy, and collaborator traits for
// the staking reward audit.
//
// This is the leaf crate every other crate in the workspace depends on. It
// defines the era/reward data model, the fatal error taxonomy, and the
// trait seams behind which the live chain and the replay backend sit.

pub mod blob;
pub mod decimal;
pub mod era;
pub mod error;
pub mod reward;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use reward_audit_core::RewardRecord;`

// Era types
pub use era::{
    contains_new_era, BlockHash, BlockNumber, ChainEvent, EraBlocks, EraBoundary, EraNumber,
    ProtocolState, NEW_ERA_EVENT, STAKING_PALLET,
};

// Reward types
pub use reward::{
    Balance, DAppId, DAppInfo, EraRewardSet, ReconciliationRow, ReimbursementLedger,
    RewardRecord, RewardsByEra, TierId, TierRewards,
};

// Opaque blobs
pub use blob::{RuntimeCode, TierConfigBlob};

// Error type
pub use error::{AuditError, EraContext};

// Traits
pub use traits::{ChainReader, ForkBackend, ForkHandle, StakingState};
