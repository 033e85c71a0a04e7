// crates/reward-audit-cli/src/commands/audit.rs
//
// `reward-audit audit`: scan (or load a snapshot), replay every era on a
// fork with the corrected runtime, reconcile, and write the reimbursement
// artifacts.
//
// Artifacts are written only after reconciliation has succeeded; an
// aborted run leaves the output directory untouched.

use std::path::{Path, PathBuf};

use clap::Args;

use reward_audit_chain::{ChopsticksBackend, SubstrateReader};
use reward_audit_core::{AuditError, ForkBackend};
use reward_audit_engine::{replay_and_reconcile, run_audit, AuditRange, AuditReport, ReplaySettings};

use crate::config::{expand_tilde, AuditConfig};
use crate::output;

#[derive(Debug, Args)]
pub struct AuditCmd {
    /// Reuse a snapshot written by `reward-audit scan` instead of rescanning.
    #[arg(long)]
    pub from_scan: Option<String>,
}

/// Run the audit subcommand.
pub async fn run(cmd: &AuditCmd, config: &AuditConfig) -> Result<(), AuditError> {
    let backend = ChopsticksBackend::new(config.chopsticks_config());
    let settings = config.replay_settings();
    let out_dir = config.output_path();

    match &cmd.from_scan {
        Some(dir) => {
            let scan_dir = PathBuf::from(expand_tilde(dir));
            audit_snapshot(&backend, &scan_dir, &out_dir, settings).await
        }
        None => {
            let range = config.range()?;
            let reader = SubstrateReader::connect(&config.endpoint).await?;
            let report = run_audit(&reader, &backend, range, settings).await?;
            publish(&out_dir, range, &report)
        }
    }
}

/// Replay a saved scan on `backend` and publish the result into `out_dir`.
pub async fn audit_snapshot<B: ForkBackend>(
    backend: &B,
    scan_dir: &Path,
    out_dir: &Path,
    settings: ReplaySettings,
) -> Result<(), AuditError> {
    let (range, scan) = output::read_scan(scan_dir)?;
    tracing::info!(
        dir = %scan_dir.display(),
        eras = scan.era_blocks.len(),
        "Loaded scan snapshot"
    );
    let report = replay_and_reconcile(backend, scan, settings).await?;
    publish(out_dir, range, &report)
}

fn publish(dir: &Path, range: AuditRange, report: &AuditReport) -> Result<(), AuditError> {
    let reconciliation = &report.reconciliation;
    let paths = output::write_artifacts(dir, range, reconciliation)?;
    for path in &paths {
        tracing::info!(path = %path.display(), "Wrote artifact");
    }

    tracing::info!(
        eras = report.scan.era_blocks.len(),
        rows = reconciliation.rows.len(),
        beneficiaries = reconciliation.ledger.len(),
        total = %reconciliation.total(),
        "Audit complete"
    );

    if reconciliation.ledger.is_empty() {
        println!("No reimbursement owed for blocks {}..{}.", range.start_block, range.end_block);
    } else {
        println!(
            "{}",
            output::format_table(&output::ledger_entries(&reconciliation.ledger))
        );
        println!();
        println!("Total owed: {}", reconciliation.total());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use reward_audit_core::{
        Balance, BlockNumber, ChainEvent, DAppInfo, EraBlocks, EraNumber, EraRewardSet, ForkHandle,
        ProtocolState, RewardRecord, RewardsByEra, RuntimeCode, StakingState, TierConfigBlob,
        TierRewards,
    };
    use reward_audit_engine::ScanOutcome;

    const ERA: EraNumber = 7;
    const BOUNDARY: BlockNumber = 700;

    /// Forks whose corrected runtime pays dApp 1 a fixed reward in [`ERA`].
    struct FixedRewardBackend {
        reward: Balance,
    }

    struct FixedRewardFork {
        reward: Balance,
        produced: AtomicBool,
    }

    #[async_trait]
    impl ForkBackend for FixedRewardBackend {
        type Fork = FixedRewardFork;

        async fn open_fork(&self, number: BlockNumber) -> Result<FixedRewardFork, AuditError> {
            assert_eq!(number, BOUNDARY - 1);
            Ok(FixedRewardFork {
                reward: self.reward,
                produced: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl StakingState for FixedRewardFork {
        async fn protocol_state(&self) -> Result<ProtocolState, AuditError> {
            let produced = self.produced.load(Ordering::SeqCst);
            Ok(ProtocolState {
                era: if produced { ERA + 1 } else { ERA },
                next_era_start: BOUNDARY + 100,
                period: 1,
                maintenance: false,
            })
        }

        async fn tier_rewards(&self, era: EraNumber) -> Result<Option<TierRewards>, AuditError> {
            if era != ERA || !self.produced.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(TierRewards {
                dapps: BTreeMap::from([(1, 0)]),
                rewards: vec![self.reward],
                period: 1,
            }))
        }

        async fn dapp_directory(&self) -> Result<Vec<DAppInfo>, AuditError> {
            Ok(vec![DAppInfo {
                id: 1,
                owner: "alice".to_string(),
                reward_beneficiary: None,
            }])
        }

        async fn events(&self) -> Result<Vec<ChainEvent>, AuditError> {
            Ok(vec![ChainEvent::new_era()])
        }

        async fn tier_config(&self) -> Result<Option<TierConfigBlob>, AuditError> {
            Ok(Some(TierConfigBlob::new(vec![0x01])))
        }
    }

    #[async_trait]
    impl ForkHandle for FixedRewardFork {
        async fn set_runtime(&self, _code: &RuntimeCode) -> Result<(), AuditError> {
            Ok(())
        }

        async fn override_tier_config(&self, _config: &TierConfigBlob) -> Result<(), AuditError> {
            Ok(())
        }

        async fn produce_block(&self) -> Result<(), AuditError> {
            self.produced.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn close(self) -> Result<(), AuditError> {
            Ok(())
        }
    }

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("reward-audit-{}-{}", label, Uuid::now_v7()))
    }

    /// Snapshot in which the chain paid dApp 1 a reward of 100 in [`ERA`].
    fn saved_scan() -> PathBuf {
        let dir = temp_dir("scan");
        let scan = ScanOutcome {
            era_blocks: EraBlocks::from([(ERA, BOUNDARY)]),
            actual: RewardsByEra::from([(
                ERA,
                EraRewardSet::from([(
                    1,
                    RewardRecord {
                        reward: 100,
                        tier_id: 0,
                        beneficiary: "alice".to_string(),
                    },
                )]),
            )]),
            runtime: RuntimeCode::new(vec![0x00, 0x61, 0x73, 0x6d]),
        };
        output::write_scan(&dir, AuditRange::new(650, 750).unwrap(), &scan).unwrap();
        dir
    }

    fn settings() -> ReplaySettings {
        ReplaySettings {
            open_timeout: Duration::from_secs(5),
            settle_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_audit_snapshot_writes_artifacts() {
        let scan_dir = saved_scan();
        let out_dir = temp_dir("out");

        let backend = FixedRewardBackend { reward: 160 };
        audit_snapshot(&backend, &scan_dir, &out_dir, settings())
            .await
            .unwrap();

        let ledger_csv = fs::read_to_string(out_dir.join(output::REIMBURSEMENT_CSV)).unwrap();
        assert_eq!(ledger_csv, "beneficiary,amount\nalice,60\n");
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 4);

        let _ = fs::remove_dir_all(scan_dir);
        let _ = fs::remove_dir_all(out_dir);
    }

    #[tokio::test]
    async fn test_aborted_audit_writes_nothing() {
        let scan_dir = saved_scan();
        let out_dir = temp_dir("out");

        // The corrected runtime pays less than the chain did.
        let backend = FixedRewardBackend { reward: 40 };
        let err = audit_snapshot(&backend, &scan_dir, &out_dir, settings())
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            AuditError::NegativeDelta {
                era: ERA,
                dapp: 1,
                expected: 40,
                actual: 100
            }
        ));
        assert!(!out_dir.exists());

        let _ = fs::remove_dir_all(scan_dir);
    }
}
