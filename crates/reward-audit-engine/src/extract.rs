// crates/reward-audit-engine/src/extract.rs
//
// Reward-set extraction shared by the scanner (live chain) and the
// reconciler (replay fork).

use std::collections::BTreeMap;

use reward_audit_core::{
    contains_new_era, AuditError, BlockNumber, DAppId, DAppInfo, EraNumber, EraRewardSet,
    RewardRecord, StakingState,
};

/// Fail unless `state`'s block emitted the era-advance event.
pub async fn ensure_era_advanced<S>(
    state: &S,
    era: EraNumber,
    block: BlockNumber,
) -> Result<(), AuditError>
where
    S: StakingState + ?Sized,
{
    let events = state.events().await?;
    if !contains_new_era(&events) {
        return Err(AuditError::MissingEraEvent { era, block });
    }
    Ok(())
}

/// Build the reward set the pallet computed for `era`.
///
/// Every dApp in the tier table must resolve to a tier reward and a
/// directory entry; the payout address is the beneficiary override if one
/// is registered, else the owner.
pub async fn extract_reward_set<S>(
    state: &S,
    era: EraNumber,
    block: BlockNumber,
) -> Result<EraRewardSet, AuditError>
where
    S: StakingState + ?Sized,
{
    let table = state
        .tier_rewards(era)
        .await?
        .ok_or(AuditError::MissingTierTable { era, block })?;

    let directory: BTreeMap<DAppId, DAppInfo> = state
        .dapp_directory()
        .await?
        .into_iter()
        .map(|info| (info.id, info))
        .collect();

    let mut rewards = EraRewardSet::new();
    for (&dapp, &tier) in &table.dapps {
        let reward = table
            .reward_for(tier)
            .ok_or(AuditError::MissingTierReward { era, dapp, tier })?;
        let info = directory
            .get(&dapp)
            .ok_or(AuditError::MissingRegistration { era, dapp })?;

        rewards.insert(
            dapp,
            RewardRecord {
                reward,
                tier_id: tier,
                beneficiary: info.beneficiary().to_string(),
            },
        );
    }

    tracing::debug!(
        "Era {}: extracted {} rewards at block {} ({} registered dApps)",
        era,
        rewards.len(),
        block,
        directory.len()
    );

    Ok(rewards)
}
