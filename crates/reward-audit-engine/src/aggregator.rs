// crates/reward-audit-engine/src/aggregator.rs
//
// Delta Aggregator: joins actual and expected reward sets by (era, dApp)
// and turns the differences into a per-beneficiary reimbursement ledger.
//
// For every pair:
//   delta = expected.reward - actual.reward
// The corrected runtime must never award less than the on-chain one, so a
// negative delta aborts with no output. Zero-delta pairs still produce a
// row but never enter the ledger.

use reward_audit_core::{
    AuditError, Balance, DAppId, EraNumber, ReconciliationRow, ReimbursementLedger, RewardsByEra,
};

/// Row-level detail plus the beneficiary ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// One row per (era, dApp), in era then dApp order.
    pub rows: Vec<ReconciliationRow>,
    pub ledger: ReimbursementLedger,
    total: i128,
}

impl Reconciliation {
    /// Total reimbursement across all beneficiaries.
    pub fn total(&self) -> i128 {
        self.total
    }
}

/// Reconcile expected rewards against actual rewards.
///
/// # Errors
/// - `UnmatchedEra` if an era appears on one side only.
/// - `MissingActual` / `MissingExpected` if a dApp appears on one side only.
/// - `NegativeDelta` if any expected reward is below its actual reward.
/// - `LedgerOverflow` if a beneficiary sum or the grand total leaves i128.
pub fn reconcile_rewards(
    actual: &RewardsByEra,
    expected: &RewardsByEra,
) -> Result<Reconciliation, AuditError> {
    if let Some(&era) = actual.keys().find(|era| !expected.contains_key(era)) {
        return Err(AuditError::UnmatchedEra(era));
    }

    let mut rows = Vec::new();
    for (&era, expected_set) in expected {
        let actual_set = actual.get(&era).ok_or(AuditError::UnmatchedEra(era))?;

        if let Some(&dapp) = actual_set.keys().find(|d| !expected_set.contains_key(d)) {
            return Err(AuditError::MissingExpected { era, dapp });
        }

        for (&dapp, expected_record) in expected_set {
            let actual_record = actual_set
                .get(&dapp)
                .ok_or(AuditError::MissingActual { era, dapp })?;
            let delta = signed_delta(era, dapp, expected_record.reward, actual_record.reward)?;

            rows.push(ReconciliationRow {
                era,
                dapp_id: dapp,
                beneficiary: expected_record.beneficiary.clone(),
                expected_tier: expected_record.tier_id,
                actual_tier: actual_record.tier_id,
                expected_reward: expected_record.reward,
                actual_reward: actual_record.reward,
                delta,
            });
        }
    }

    let ledger = build_ledger(&rows)?;
    let total = ledger.total()?;
    tracing::info!(
        "Reconciled {} rows; {} beneficiaries owed {} in total",
        rows.len(),
        ledger.len(),
        total
    );

    Ok(Reconciliation {
        rows,
        ledger,
        total,
    })
}

/// Sum non-zero deltas per beneficiary.
pub fn build_ledger(rows: &[ReconciliationRow]) -> Result<ReimbursementLedger, AuditError> {
    let mut ledger = ReimbursementLedger::new();
    for row in rows.iter().filter(|row| row.delta != 0) {
        ledger.credit(&row.beneficiary, row.delta)?;
    }
    Ok(ledger)
}

fn signed_delta(
    era: EraNumber,
    dapp: DAppId,
    expected: Balance,
    actual: Balance,
) -> Result<i128, AuditError> {
    if expected < actual {
        return Err(AuditError::NegativeDelta {
            era,
            dapp,
            expected,
            actual,
        });
    }
    i128::try_from(expected - actual).map_err(|_| AuditError::DeltaOverflow { era, dapp })
}
