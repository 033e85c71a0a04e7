// crates/reward-audit-engine/src/scanner.rs
//
// Era Scanner: walks the live chain from the start block, discovering each
// era boundary and recording the reward distribution the on-chain runtime
// actually computed there.
//
// Read-only against the chain. Each boundary is found from the protocol
// state anchored at the previous one, so discovery is inherently sequential.

use reward_audit_core::{
    AuditError, BlockNumber, ChainReader, EraBlocks, EraContext, EraNumber, RewardsByEra,
    RuntimeCode, StakingState,
};

use crate::extract::{ensure_era_advanced, extract_reward_set};
use crate::range::AuditRange;

/// Everything the scanner learns from the live chain.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Era to boundary block, era-ascending.
    pub era_blocks: EraBlocks,
    /// Rewards actually computed on-chain, per era.
    pub actual: RewardsByEra,
    /// Corrected runtime, taken from the end of the scanned range.
    pub runtime: RuntimeCode,
}

/// Walks era boundaries on a live chain.
pub struct EraScanner<'a, C: ChainReader> {
    reader: &'a C,
}

impl<'a, C: ChainReader> EraScanner<'a, C> {
    pub fn new(reader: &'a C) -> Self {
        Self { reader }
    }

    /// Discover every era boundary in `range` and capture its rewards.
    ///
    /// Stops once the next era starts at or past `range.end_block`, then
    /// extracts the runtime code at the end block.
    pub async fn scan(&self, range: AuditRange) -> Result<ScanOutcome, AuditError> {
        tracing::info!(
            "Scanning era boundaries in blocks {}..{}",
            range.start_block,
            range.end_block
        );

        let start_hash = self.reader.block_hash(range.start_block).await?;
        let mut state = self
            .reader
            .state_at(start_hash)
            .await?
            .protocol_state()
            .await?;

        let mut era_blocks = EraBlocks::new();
        let mut actual = RewardsByEra::new();

        while range.covers_boundary(state.next_era_start) {
            let era = state.era;
            let block = state.next_era_start;
            era_blocks.insert(era, block);

            let snapshot = self.anchor(block).await.in_era(era, block)?;
            ensure_era_advanced(&snapshot, era, block)
                .await
                .in_era(era, block)?;

            let rewards = extract_reward_set(&snapshot, era, block)
                .await
                .in_era(era, block)?;
            tracing::info!(
                "Era {} boundary at block {}: {} rewarded dApps",
                era,
                block,
                rewards.len()
            );
            actual.insert(era, rewards);

            state = snapshot.protocol_state().await.in_era(era, block)?;
            check_progress(era, block, state.next_era_start)?;
        }

        let end_hash = self.reader.block_hash(range.end_block).await?;
        let runtime = self.reader.runtime_code(end_hash).await?;
        tracing::info!(
            "Scan complete: {} eras, runtime of {} bytes at block {}",
            era_blocks.len(),
            runtime.len(),
            range.end_block
        );

        Ok(ScanOutcome {
            era_blocks,
            actual,
            runtime,
        })
    }

    async fn anchor(&self, block: BlockNumber) -> Result<C::State, AuditError> {
        let hash = self.reader.block_hash(block).await?;
        tracing::debug!("Anchored state at block {} ({})", block, hash);
        self.reader.state_at(hash).await
    }
}

/// Boundaries must strictly increase, or the scan would never terminate.
fn check_progress(
    era: EraNumber,
    previous: BlockNumber,
    next: BlockNumber,
) -> Result<(), AuditError> {
    if next <= previous {
        return Err(AuditError::BoundaryStalled {
            era,
            previous,
            next,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_must_advance() {
        assert!(check_progress(1, 100, 101).is_ok());
        assert!(matches!(
            check_progress(1, 100, 100),
            Err(AuditError::BoundaryStalled {
                era: 1,
                previous: 100,
                next: 100
            })
        ));
        assert!(check_progress(1, 100, 50).is_err());
    }
}
