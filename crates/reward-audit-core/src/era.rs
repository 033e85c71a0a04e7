// crates/reward-audit-core/src/era.rs
//
// Era bookkeeping: protocol-state snapshots, discovered era boundaries,
// and the events used to confirm that an era transition actually ran.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Era index as stored by the reward pallet.
pub type EraNumber = u32;

/// Block height on the audited chain.
pub type BlockNumber = u32;

/// Pallet that owns the tier-based reward calculation.
pub const STAKING_PALLET: &str = "DappStaking";

/// Event emitted by [`STAKING_PALLET`] when the era is bumped.
pub const NEW_ERA_EVENT: &str = "NewEra";

/// 32-byte block hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Snapshot of the reward pallet's active protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolState {
    /// The era currently in progress.
    pub era: EraNumber,
    /// Block at which the next era starts (and rewards for `era` are computed).
    pub next_era_start: BlockNumber,
    /// Staking period number.
    pub period: u32,
    /// Whether the pallet is in maintenance mode.
    pub maintenance: bool,
}

/// One discovered era transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraBoundary {
    pub era: EraNumber,
    pub block_number: BlockNumber,
}

/// Era-ascending map of era to its boundary block.
pub type EraBlocks = BTreeMap<EraNumber, BlockNumber>;

/// A decoded runtime event, reduced to its pallet and variant names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub pallet: String,
    pub variant: String,
}

impl ChainEvent {
    pub fn new(pallet: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            pallet: pallet.into(),
            variant: variant.into(),
        }
    }

    /// The era-advance event of the reward pallet.
    pub fn new_era() -> Self {
        Self::new(STAKING_PALLET, NEW_ERA_EVENT)
    }

    pub fn is_new_era(&self) -> bool {
        self.pallet == STAKING_PALLET && self.variant == NEW_ERA_EVENT
    }
}

/// True if the event log contains the era-advance event.
pub fn contains_new_era(events: &[ChainEvent]) -> bool {
    events.iter().any(ChainEvent::is_new_era)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_era_detection() {
        let events = vec![
            ChainEvent::new("System", "ExtrinsicSuccess"),
            ChainEvent::new("Balances", "Deposit"),
        ];
        assert!(!contains_new_era(&events));

        let mut with_era = events.clone();
        with_era.push(ChainEvent::new_era());
        assert!(contains_new_era(&with_era));
    }

    #[test]
    fn test_new_era_requires_matching_pallet() {
        let events = vec![ChainEvent::new("Staking", NEW_ERA_EVENT)];
        assert!(!contains_new_era(&events));
    }
}
