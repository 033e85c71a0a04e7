// crates/reward-audit-core/src/reward.rs
//
// Reward-side data model: the on-chain tier table and recipient directory,
// per-era reward sets, and the reconciliation output.
//
// All monetary values are in the chain's smallest unit and held as u128.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::decimal;
use crate::era::EraNumber;
use crate::error::AuditError;

/// Chain balance in the smallest unit.
pub type Balance = u128;

/// Integer identifier the reward pallet assigns to a registered dApp.
pub type DAppId = u16;

/// Reward tier index.
pub type TierId = u8;

/// Per-era tier table as stored by the reward pallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRewards {
    /// Tier assignment per dApp.
    pub dapps: BTreeMap<DAppId, TierId>,
    /// Reward per dApp in each tier, indexed by tier id.
    pub rewards: Vec<Balance>,
    /// Period the table was computed for.
    pub period: u32,
}

impl TierRewards {
    /// Reward amount for a tier, if the table has one.
    pub fn reward_for(&self, tier: TierId) -> Option<Balance> {
        self.rewards.get(tier as usize).copied()
    }
}

/// Entry of the registered-recipient directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DAppInfo {
    pub id: DAppId,
    /// Registered owner address.
    pub owner: String,
    /// Explicit payout address, overriding the owner when set.
    pub reward_beneficiary: Option<String>,
}

impl DAppInfo {
    /// Address entitled to this dApp's rewards.
    pub fn beneficiary(&self) -> &str {
        self.reward_beneficiary.as_deref().unwrap_or(&self.owner)
    }
}

/// One recipient's computed reward for one era under one runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    #[serde(with = "decimal::u128_string")]
    pub reward: Balance,
    pub tier_id: TierId,
    pub beneficiary: String,
}

/// Rewards for a single era, keyed by dApp id.
pub type EraRewardSet = BTreeMap<DAppId, RewardRecord>;

/// Era-ascending map of era to its reward set.
pub type RewardsByEra = BTreeMap<EraNumber, EraRewardSet>;

/// Expected-vs-actual comparison for one (era, dApp) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub era: EraNumber,
    pub dapp_id: DAppId,
    pub beneficiary: String,
    pub expected_tier: TierId,
    pub actual_tier: TierId,
    #[serde(with = "decimal::u128_string")]
    pub expected_reward: Balance,
    #[serde(with = "decimal::u128_string")]
    pub actual_reward: Balance,
    /// `expected_reward - actual_reward`; never negative in a completed run.
    #[serde(with = "decimal::i128_string")]
    pub delta: i128,
}

/// Beneficiary-level reimbursement totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReimbursementLedger {
    #[serde(with = "decimal::i128_map")]
    entries: BTreeMap<String, i128>,
}

impl ReimbursementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to a beneficiary's running total.
    ///
    /// The entry is left untouched when the sum leaves the i128 range.
    pub fn credit(&mut self, beneficiary: &str, amount: i128) -> Result<(), AuditError> {
        let entry = self.entries.entry(beneficiary.to_string()).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| AuditError::LedgerOverflow {
                beneficiary: beneficiary.to_string(),
            })?;
        Ok(())
    }

    pub fn get(&self, beneficiary: &str) -> Option<i128> {
        self.entries.get(beneficiary).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i128)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sum over all beneficiaries.
    pub fn total(&self) -> Result<i128, AuditError> {
        self.entries.iter().try_fold(0i128, |acc, (beneficiary, amount)| {
            acc.checked_add(*amount).ok_or_else(|| AuditError::LedgerOverflow {
                beneficiary: beneficiary.clone(),
            })
        })
    }
}
