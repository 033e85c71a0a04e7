// crates/reward-audit-core/src/error.rs

use thiserror::Error;

use crate::era::{BlockNumber, EraNumber};
use crate::reward::{Balance, DAppId, TierId};

/// Audit-wide error taxonomy.
///
/// Every variant is fatal: the pipeline never retries or recovers locally,
/// so each error carries enough context to tell which era or block was
/// being processed when it surfaced.
#[derive(Debug, Error)]
pub enum AuditError {
    // -- Integrity violations -------------------------------------------

    /// The era-boundary block did not emit the era-advance event.
    #[error("no era-advance event at block {block} (era {era})")]
    MissingEraEvent { era: EraNumber, block: BlockNumber },

    /// A recipient in the tier table has no registration entry.
    #[error("dApp {dapp} in era {era} tier table is not registered")]
    MissingRegistration { era: EraNumber, dapp: DAppId },

    /// A recipient's tier has no reward amount in the tier table.
    #[error("era {era}: dApp {dapp} assigned to tier {tier} which has no reward entry")]
    MissingTierReward {
        era: EraNumber,
        dapp: DAppId,
        tier: TierId,
    },

    /// The tier table for an era is absent at its boundary block.
    #[error("no tier table for era {era} at block {block}")]
    MissingTierTable { era: EraNumber, block: BlockNumber },

    /// An expected reward has no actual counterpart.
    #[error("era {era}: dApp {dapp} has an expected reward but no actual reward")]
    MissingActual { era: EraNumber, dapp: DAppId },

    /// An actual reward has no expected counterpart.
    #[error("era {era}: dApp {dapp} has an actual reward but no expected reward")]
    MissingExpected { era: EraNumber, dapp: DAppId },

    /// An expected era set is missing entirely from the actual side (or vice versa).
    #[error("era {0} is present on only one side of the reconciliation")]
    UnmatchedEra(EraNumber),

    /// The corrected runtime awarded less than the on-chain runtime.
    #[error("era {era}: dApp {dapp} expected reward {expected} is below actual reward {actual}")]
    NegativeDelta {
        era: EraNumber,
        dapp: DAppId,
        expected: Balance,
        actual: Balance,
    },

    /// A delta does not fit the signed ledger representation.
    #[error("era {era}: dApp {dapp} delta overflows the ledger")]
    DeltaOverflow { era: EraNumber, dapp: DAppId },

    /// A beneficiary's accumulated reimbursement, or the ledger total,
    /// exceeds the signed ledger range.
    #[error("reimbursement for {beneficiary} overflows the ledger")]
    LedgerOverflow { beneficiary: String },

    /// The tier configuration could not be read back from a replayed fork.
    #[error("no tier configuration on the replay fork for era {era}")]
    MissingTierConfig { era: EraNumber },

    // -- Non-termination guard ------------------------------------------

    /// The next-era-start block did not advance between two boundaries.
    #[error("era boundary stalled after era {era}: next era start {next} is not past {previous}")]
    BoundaryStalled {
        era: EraNumber,
        previous: BlockNumber,
        next: BlockNumber,
    },

    // -- Collaborator failures ------------------------------------------

    /// No block hash exists for the given block number.
    #[error("block {0} not found")]
    BlockNotFound(BlockNumber),

    /// The replay fork did not become ready in time.
    #[error("fork for era {era} at block {block} not ready after {secs}s")]
    ForkTimeout {
        era: EraNumber,
        block: BlockNumber,
        secs: u64,
    },

    /// Chain RPC error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Fork/replay backend error.
    #[error("Fork error: {0}")]
    Fork(String),

    /// Storage value could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wraps another error with the era and block being processed.
    #[error("era {era} (block {block}): {source}")]
    Context {
        era: EraNumber,
        block: BlockNumber,
        #[source]
        source: Box<AuditError>,
    },
}

impl AuditError {
    /// Attach era/block context, leaving already-contextualised errors alone.
    pub fn in_era(self, era: EraNumber, block: BlockNumber) -> Self {
        match self {
            AuditError::Context { .. } => self,
            other => AuditError::Context {
                era,
                block,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AuditError {
        match self {
            AuditError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for AuditError {
    fn from(e: std::io::Error) -> Self {
        AuditError::Io(e.to_string())
    }
}

impl From<hex::FromHexError> for AuditError {
    fn from(e: hex::FromHexError) -> Self {
        AuditError::Decode(e.to_string())
    }
}

/// Extension for attaching era context to any fallible audit step.
pub trait EraContext<T> {
    fn in_era(self, era: EraNumber, block: BlockNumber) -> Result<T, AuditError>;
}

impl<T> EraContext<T> for Result<T, AuditError> {
    fn in_era(self, era: EraNumber, block: BlockNumber) -> Result<T, AuditError> {
        self.map_err(|e| e.in_era(era, block))
    }
}
