// crates/reward-audit-cli/src/commands/scan.rs
//
// `reward-audit scan`: discover era boundaries and on-chain rewards, then
// write a reusable snapshot.

use reward_audit_chain::SubstrateReader;
use reward_audit_core::AuditError;
use reward_audit_engine::EraScanner;

use crate::config::AuditConfig;
use crate::output;

/// Run the scan subcommand.
pub async fn run(config: &AuditConfig) -> Result<(), AuditError> {
    let range = config.range()?;
    tracing::info!(
        start = range.start_block,
        end = range.end_block,
        endpoint = %config.endpoint,
        "Scanning era boundaries"
    );

    let reader = SubstrateReader::connect(&config.endpoint).await?;
    let scan = EraScanner::new(&reader).scan(range).await?;

    let dir = config.output_path();
    output::write_scan(&dir, range, &scan)?;

    println!("{}", output::format_table(&output::era_summary(&scan)));
    println!();
    println!("Snapshot written to {}", dir.display());
    Ok(())
}
