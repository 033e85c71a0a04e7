// crates/reward-audit-cli/src/output.rs
//
// Artifact writers and console tables for the audit CLI.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled};
use uuid::Uuid;

use reward_audit_core::decimal;
use reward_audit_core::{
    AuditError, BlockNumber, EraBlocks, ReconciliationRow, ReimbursementLedger, RewardsByEra,
    RuntimeCode,
};
use reward_audit_engine::{AuditRange, Reconciliation, ScanOutcome};

pub const SCAN_FILE: &str = "scan.json";
pub const RUNTIME_FILE: &str = "runtime.wasm";
pub const RECONCILIATION_JSON: &str = "reconciliation.json";
pub const RECONCILIATION_CSV: &str = "reconciliation.csv";
pub const REIMBURSEMENT_JSON: &str = "reimbursement.json";
pub const REIMBURSEMENT_CSV: &str = "reimbursement.csv";

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

fn csv_err(e: csv::Error) -> AuditError {
    AuditError::Serialization(e.to_string())
}

fn ensure_parent(path: &Path) -> Result<(), AuditError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AuditError> {
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// One CSV record per row, headed by the row type's field names.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AuditError> {
    ensure_parent(path)?;
    let mut writer = Writer::from_writer(File::create(path)?);
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Scan snapshot
// ---------------------------------------------------------------------------

/// On-disk form of a completed scan. The runtime travels next to it as raw
/// WASM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    pub era_blocks: EraBlocks,
    pub actual: RewardsByEra,
}

pub fn write_scan(dir: &Path, range: AuditRange, scan: &ScanOutcome) -> Result<(), AuditError> {
    let snapshot = ScanSnapshot {
        start_block: range.start_block,
        end_block: range.end_block,
        era_blocks: scan.era_blocks.clone(),
        actual: scan.actual.clone(),
    };
    write_json(&dir.join(SCAN_FILE), &snapshot)?;
    fs::write(dir.join(RUNTIME_FILE), scan.runtime.as_bytes())?;
    tracing::info!(dir = %dir.display(), eras = scan.era_blocks.len(), "Wrote scan snapshot");
    Ok(())
}

pub fn read_scan(dir: &Path) -> Result<(AuditRange, ScanOutcome), AuditError> {
    let snapshot: ScanSnapshot =
        serde_json::from_str(&fs::read_to_string(dir.join(SCAN_FILE))?)?;
    let runtime = RuntimeCode::new(fs::read(dir.join(RUNTIME_FILE))?);
    if runtime.is_empty() {
        return Err(AuditError::Config(format!(
            "{} in {} is empty",
            RUNTIME_FILE,
            dir.display()
        )));
    }

    let range = AuditRange::new(snapshot.start_block, snapshot.end_block)?;
    let missing: Vec<_> = snapshot
        .era_blocks
        .keys()
        .filter(|era| !snapshot.actual.contains_key(era))
        .collect();
    if !missing.is_empty() {
        return Err(AuditError::Config(format!(
            "scan snapshot has no rewards for eras {:?}",
            missing
        )));
    }

    Ok((
        range,
        ScanOutcome {
            era_blocks: snapshot.era_blocks,
            actual: snapshot.actual,
            runtime,
        },
    ))
}

// ---------------------------------------------------------------------------
// Reimbursement artifacts
// ---------------------------------------------------------------------------

/// Header and ledger written to `reimbursement.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub start_block: BlockNumber,
    pub end_block: BlockNumber,
    #[serde(with = "decimal::i128_string")]
    pub total: i128,
    pub reimbursements: ReimbursementLedger,
}

impl ReimbursementReport {
    pub fn new(range: AuditRange, reconciliation: &Reconciliation) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            start_block: range.start_block,
            end_block: range.end_block,
            total: reconciliation.total(),
            reimbursements: reconciliation.ledger.clone(),
        }
    }
}

/// One `reimbursement.csv` record; also the ledger's console row.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ReimbursementEntry {
    pub beneficiary: String,
    pub amount: String,
}

pub fn ledger_entries(ledger: &ReimbursementLedger) -> Vec<ReimbursementEntry> {
    ledger
        .iter()
        .map(|(beneficiary, amount)| ReimbursementEntry {
            beneficiary: beneficiary.to_string(),
            amount: amount.to_string(),
        })
        .collect()
}

/// Artifacts written to hidden temp files next to their final names.
///
/// Nothing appears under a final name until [`StagedArtifacts::commit`];
/// dropping an uncommitted stage removes whatever temp files it holds.
struct StagedArtifacts {
    dir: PathBuf,
    tag: Uuid,
    files: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl StagedArtifacts {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            tag: Uuid::now_v7(),
            files: Vec::new(),
            committed: false,
        }
    }

    /// Temp path to write `name` to.
    fn stage(&mut self, name: &str) -> PathBuf {
        let temp = self.dir.join(format!(".{}.tmp-{}", name, self.tag));
        self.files.push((temp.clone(), self.dir.join(name)));
        temp
    }

    fn commit(mut self) -> Result<Vec<PathBuf>, AuditError> {
        for (temp, path) in &self.files {
            fs::rename(temp, path)?;
        }
        self.committed = true;
        Ok(self.files.iter().map(|(_, path)| path.clone()).collect())
    }
}

impl Drop for StagedArtifacts {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (temp, _) in &self.files {
            let _ = fs::remove_file(temp);
        }
    }
}

/// Write the four reconciliation artifacts into `dir`.
///
/// All four are staged first; a failure while staging leaves no artifact
/// behind.
pub fn write_artifacts(
    dir: &Path,
    range: AuditRange,
    reconciliation: &Reconciliation,
) -> Result<Vec<PathBuf>, AuditError> {
    fs::create_dir_all(dir)?;
    let mut staged = StagedArtifacts::new(dir);

    let rows: &[ReconciliationRow] = &reconciliation.rows;
    write_json(&staged.stage(RECONCILIATION_JSON), &rows)?;
    write_csv(&staged.stage(RECONCILIATION_CSV), rows)?;
    write_json(
        &staged.stage(REIMBURSEMENT_JSON),
        &ReimbursementReport::new(range, reconciliation),
    )?;
    write_csv(
        &staged.stage(REIMBURSEMENT_CSV),
        &ledger_entries(&reconciliation.ledger),
    )?;

    staged.commit()
}

// ---------------------------------------------------------------------------
// Console tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Tabled)]
pub struct EraSummaryRow {
    pub era: u32,
    pub block: u32,
    pub dapps: usize,
    pub total_reward: String,
}

pub fn era_summary(scan: &ScanOutcome) -> Vec<EraSummaryRow> {
    scan.era_blocks
        .iter()
        .map(|(&era, &block)| {
            let set = scan.actual.get(&era);
            EraSummaryRow {
                era,
                block,
                dapps: set.map_or(0, |s| s.len()),
                total_reward: set
                    .map_or(0u128, |s| {
                        s.values().fold(0u128, |acc, r| acc.saturating_add(r.reward))
                    })
                    .to_string(),
            }
        })
        .collect()
}
