// crates/reward-audit-engine/src/pipeline.rs
//
// End-to-end audit: scan, then replay, then reconcile.
//
// The phases never interleave. The reconciler needs the complete era list
// and the runtime extracted at the end of the scanned range before its
// first fork is opened.

use reward_audit_core::{AuditError, ChainReader, ForkBackend, RewardsByEra};

use crate::aggregator::{reconcile_rewards, Reconciliation};
use crate::range::AuditRange;
use crate::reconciler::{ReplayReconciler, ReplaySettings};
use crate::scanner::{EraScanner, ScanOutcome};

/// Everything produced by a completed audit.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub scan: ScanOutcome,
    pub expected: RewardsByEra,
    pub reconciliation: Reconciliation,
}

/// Run all three phases against live collaborators.
pub async fn run_audit<C, B>(
    reader: &C,
    backend: &B,
    range: AuditRange,
    settings: ReplaySettings,
) -> Result<AuditReport, AuditError>
where
    C: ChainReader,
    B: ForkBackend,
{
    let scan = EraScanner::new(reader).scan(range).await?;
    replay_and_reconcile(backend, scan, settings).await
}

/// Run the replay and aggregation phases over an existing scan.
pub async fn replay_and_reconcile<B: ForkBackend>(
    backend: &B,
    scan: ScanOutcome,
    settings: ReplaySettings,
) -> Result<AuditReport, AuditError> {
    let expected = ReplayReconciler::new(backend, settings)
        .reconcile(&scan.era_blocks, &scan.runtime)
        .await?;
    let reconciliation = reconcile_rewards(&scan.actual, &expected)?;

    Ok(AuditReport {
        scan,
        expected,
        reconciliation,
    })
}
