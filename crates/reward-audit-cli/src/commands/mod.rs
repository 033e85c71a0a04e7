// crates/reward-audit-cli/src/commands/mod.rs
//
// Command module declarations for the audit CLI.

pub mod audit;
pub mod scan;
