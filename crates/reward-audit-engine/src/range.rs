// crates/reward-audit-engine/src/range.rs
//
// Block range covered by an audit run.

use reward_audit_core::{AuditError, BlockNumber};
use serde::{Deserialize, Serialize};

/// Block range to scan for era boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRange {
    /// Block at which the initial protocol state is read (inclusive).
    pub start_block: BlockNumber,
    /// Boundaries at or past this block are not audited (exclusive). The
    /// corrected runtime is extracted from this block.
    pub end_block: BlockNumber,
}

impl AuditRange {
    /// Create a validated range.
    pub fn new(start_block: BlockNumber, end_block: BlockNumber) -> Result<Self, AuditError> {
        if start_block >= end_block {
            return Err(AuditError::Config(format!(
                "Invalid block range: start {} must be below end {}",
                start_block, end_block
            )));
        }
        Ok(Self {
            start_block,
            end_block,
        })
    }

    /// True if an era boundary at `block` falls inside the audited range.
    pub fn covers_boundary(&self, block: BlockNumber) -> bool {
        block < self.end_block
    }
}
