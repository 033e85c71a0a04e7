// crates/reward-audit-cli/src/main.rs
//
// CLI entrypoint for the staking reward audit.
//
// Loads configuration, applies command-line overrides, initializes
// tracing, and dispatches to the scan or audit command.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use commands::audit::AuditCmd;
use config::AuditConfig;
use reward_audit_core::BlockNumber;

/// Staking reward audit: recompute era rewards under a corrected runtime
/// and report what each beneficiary is owed.
#[derive(Parser, Debug)]
#[command(name = "reward-audit", version = "0.1.0", about = "Staking reward audit and reimbursement calculator")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "reward-audit.toml")]
    config: String,

    /// Archive node URL (overrides the config file).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// First block of the audited range.
    #[arg(long, global = true)]
    start_block: Option<BlockNumber>,

    /// Exclusive end of the audited range.
    #[arg(long, global = true)]
    end_block: Option<BlockNumber>,

    /// Directory for snapshots and artifacts.
    #[arg(long, global = true)]
    output_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Discover era boundaries and on-chain rewards; write a snapshot.
    Scan,

    /// Replay every era with the corrected runtime and write reimbursements.
    Audit(AuditCmd),
}

impl Cli {
    fn apply_overrides(&self, config: &mut AuditConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(start) = self.start_block {
            config.start_block = start;
        }
        if let Some(end) = self.end_block {
            config.end_block = end;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = AuditConfig::load(&cli.config);
    let mut config = match &loaded {
        Ok(cfg) => cfg.clone(),
        Err(_) => AuditConfig::default(),
    };
    cli.apply_overrides(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match loaded {
        Ok(_) => tracing::info!("Loaded configuration from {}", cli.config),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            cli.config,
            e
        ),
    }

    config.validate()?;

    let result = match &cli.command {
        Commands::Scan => commands::scan::run(&config).await,
        Commands::Audit(cmd) => commands::audit::run(cmd, &config).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Aborted");
    }
    result?;
    Ok(())
}
