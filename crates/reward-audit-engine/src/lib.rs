// crates/reward-audit-engine/src/lib.rs
//
// reward-audit-engine: era discovery and reward reconciliation.
//
// Three sequential phases over an era-keyed dataset:
//   1. EraScanner walks era boundaries on the live chain and records the
//      rewards the on-chain runtime computed.
//   2. ReplayReconciler re-runs each boundary on an isolated fork with the
//      corrected runtime, carrying the tier configuration era to era.
//   3. reconcile_rewards joins both sides into signed per-era deltas and a
//      beneficiary reimbursement ledger.

pub mod aggregator;
pub mod extract;
pub mod pipeline;
pub mod range;
pub mod reconciler;
pub mod scanner;

// Re-export key types for ergonomic access from downstream crates.
pub use aggregator::{build_ledger, reconcile_rewards, Reconciliation};
pub use extract::{ensure_era_advanced, extract_reward_set};
pub use pipeline::{replay_and_reconcile, run_audit, AuditReport};
pub use range::AuditRange;
pub use reconciler::{
    EraReplay, ReplayReconciler, ReplaySettings, DEFAULT_OPEN_TIMEOUT, DEFAULT_SETTLE_DELAY,
};
pub use scanner::{EraScanner, ScanOutcome};
