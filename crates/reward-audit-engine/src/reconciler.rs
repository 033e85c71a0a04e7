// crates/reward-audit-engine/src/reconciler.rs
//
// Replay Reconciler: re-executes every era-bump transition on an isolated
// fork running the corrected runtime, and records the reward distribution
// that should have resulted.
//
// Replays are strictly sequential. The tier threshold configuration read
// back from era N's fork is written into era N+1's fork before its block is
// produced, so the fix compounds across eras exactly as it would have on
// chain. At most one fork exists at a time.

use std::time::Duration;

use reward_audit_core::{
    AuditError, BlockNumber, EraBlocks, EraContext, EraNumber, EraRewardSet, ForkBackend,
    ForkHandle, RewardsByEra, RuntimeCode, TierConfigBlob,
};

use crate::extract::{ensure_era_advanced, extract_reward_set};

/// Default wait for a fork to become ready.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(300);

/// Default pause between tearing one fork down and opening the next.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Operational knobs for the replay backend.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySettings {
    /// Upper bound on fork acquisition; exceeding it aborts the run.
    pub open_timeout: Duration,
    /// Pause before each fork after the first.
    pub settle_delay: Duration,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Result of replaying a single era.
#[derive(Debug, Clone)]
pub struct EraReplay {
    pub rewards: EraRewardSet,
    /// Tier configuration read from the fork after block production.
    pub tier_config: TierConfigBlob,
}

/// Drives one fork per era through the corrected runtime.
pub struct ReplayReconciler<'a, B: ForkBackend> {
    backend: &'a B,
    settings: ReplaySettings,
}

impl<'a, B: ForkBackend> ReplayReconciler<'a, B> {
    pub fn new(backend: &'a B, settings: ReplaySettings) -> Self {
        Self { backend, settings }
    }

    /// Replay every era in `era_blocks` (era-ascending) under `runtime`.
    ///
    /// Any failure aborts the whole run.
    pub async fn reconcile(
        &self,
        era_blocks: &EraBlocks,
        runtime: &RuntimeCode,
    ) -> Result<RewardsByEra, AuditError> {
        tracing::info!(
            "Replaying {} eras with corrected runtime ({} bytes)",
            era_blocks.len(),
            runtime.len()
        );

        let mut expected = RewardsByEra::new();
        let mut carried: Option<TierConfigBlob> = None;

        for (index, (&era, &block)) in era_blocks.iter().enumerate() {
            if index > 0 && !self.settings.settle_delay.is_zero() {
                tracing::debug!("Settling for {:?} before next fork", self.settings.settle_delay);
                tokio::time::sleep(self.settings.settle_delay).await;
            }

            let replay = self
                .replay_era(era, block, runtime, carried.as_ref())
                .await
                .in_era(era, block)?;

            tracing::info!(
                "Era {} replayed at block {}: {} rewarded dApps",
                era,
                block,
                replay.rewards.len()
            );

            expected.insert(era, replay.rewards);
            carried = Some(replay.tier_config);
        }

        Ok(expected)
    }

    /// Replay one era on a fresh fork. The fork is closed on every path.
    pub async fn replay_era(
        &self,
        era: EraNumber,
        block: BlockNumber,
        runtime: &RuntimeCode,
        carried: Option<&TierConfigBlob>,
    ) -> Result<EraReplay, AuditError> {
        let parent = block.checked_sub(1).ok_or_else(|| {
            AuditError::Fork(format!("era {} boundary at block 0 has no parent", era))
        })?;

        let fork = match tokio::time::timeout(
            self.settings.open_timeout,
            self.backend.open_fork(parent),
        )
        .await
        {
            Ok(opened) => opened?,
            Err(_) => {
                return Err(AuditError::ForkTimeout {
                    era,
                    block: parent,
                    secs: self.settings.open_timeout.as_secs(),
                })
            }
        };

        let outcome = replay_on_fork(&fork, era, block, runtime, carried).await;
        let closed = fork.close().await;

        let replay = outcome?;
        closed?;
        Ok(replay)
    }
}

async fn replay_on_fork<F: ForkHandle>(
    fork: &F,
    era: EraNumber,
    block: BlockNumber,
    runtime: &RuntimeCode,
    carried: Option<&TierConfigBlob>,
) -> Result<EraReplay, AuditError> {
    fork.set_runtime(runtime).await?;

    if let Some(config) = carried {
        tracing::debug!("Era {}: overriding tier config ({} bytes)", era, config.len());
        fork.override_tier_config(config).await?;
    }

    fork.produce_block().await?;
    ensure_era_advanced(fork, era, block).await?;

    let tier_config = fork
        .tier_config()
        .await?
        .ok_or(AuditError::MissingTierConfig { era })?;
    let rewards = extract_reward_set(fork, era, block).await?;

    Ok(EraReplay {
        rewards,
        tier_config,
    })
}
