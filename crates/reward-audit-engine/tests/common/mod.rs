// crates/reward-audit-engine/tests/common/mod.rs
//
// In-memory chain and fork collaborators for the engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reward_audit_core::{
    AuditError, Balance, BlockHash, BlockNumber, ChainEvent, ChainReader, DAppId, DAppInfo,
    EraNumber, ForkBackend, ForkHandle, ProtocolState, RuntimeCode, StakingState,
    TierConfigBlob, TierId, TierRewards,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Directory where every dApp's beneficiary is its own single-letter name.
pub fn directory(names: &[(DAppId, &str)]) -> Vec<DAppInfo> {
    names
        .iter()
        .map(|&(id, name)| DAppInfo {
            id,
            owner: format!("owner-{}", name),
            reward_beneficiary: Some(name.to_string()),
        })
        .collect()
}

/// Tier table that puts each dApp in its own tier paying `reward`.
pub fn table(entries: &[(DAppId, Balance)]) -> TierRewards {
    let mut dapps = BTreeMap::new();
    let mut rewards = Vec::new();
    for (index, &(dapp, reward)) in entries.iter().enumerate() {
        dapps.insert(dapp, index as TierId);
        rewards.push(reward);
    }
    TierRewards {
        dapps,
        rewards,
        period: 1,
    }
}

pub fn hash_of(number: BlockNumber) -> BlockHash {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(&number.to_be_bytes());
    BlockHash(bytes)
}

fn number_of(hash: BlockHash) -> BlockNumber {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&hash.0[..4]);
    BlockNumber::from_be_bytes(bytes)
}

// ---------------------------------------------------------------------------
// Mock chain
// ---------------------------------------------------------------------------

/// State visible at one block of the mock chain.
#[derive(Debug, Clone)]
pub struct MockSnapshot {
    pub protocol: ProtocolState,
    pub tiers: BTreeMap<EraNumber, TierRewards>,
    pub directory: Vec<DAppInfo>,
    pub events: Vec<ChainEvent>,
    pub tier_config: Option<TierConfigBlob>,
}

impl MockSnapshot {
    pub fn at_era(era: EraNumber, next_era_start: BlockNumber) -> Self {
        Self {
            protocol: ProtocolState {
                era,
                next_era_start,
                period: 1,
                maintenance: false,
            },
            tiers: BTreeMap::new(),
            directory: Vec::new(),
            events: Vec::new(),
            tier_config: None,
        }
    }

    /// Boundary block that bumped `ended_era` and computed its tier table.
    pub fn boundary(
        ended_era: EraNumber,
        next_era_start: BlockNumber,
        tiers: TierRewards,
        directory: Vec<DAppInfo>,
    ) -> Self {
        let mut snapshot = Self::at_era(ended_era + 1, next_era_start);
        snapshot.tiers.insert(ended_era, tiers);
        snapshot.directory = directory;
        snapshot.events = vec![ChainEvent::new("System", "ExtrinsicSuccess"), ChainEvent::new_era()];
        snapshot
    }
}

#[async_trait]
impl StakingState for MockSnapshot {
    async fn protocol_state(&self) -> Result<ProtocolState, AuditError> {
        Ok(self.protocol.clone())
    }

    async fn tier_rewards(&self, era: EraNumber) -> Result<Option<TierRewards>, AuditError> {
        Ok(self.tiers.get(&era).cloned())
    }

    async fn dapp_directory(&self) -> Result<Vec<DAppInfo>, AuditError> {
        Ok(self.directory.clone())
    }

    async fn events(&self) -> Result<Vec<ChainEvent>, AuditError> {
        Ok(self.events.clone())
    }

    async fn tier_config(&self) -> Result<Option<TierConfigBlob>, AuditError> {
        Ok(self.tier_config.clone())
    }
}

/// Archive chain backed by a map of block snapshots.
#[derive(Debug, Default)]
pub struct MockChain {
    pub blocks: BTreeMap<BlockNumber, MockSnapshot>,
    pub runtime: Vec<u8>,
    pub runtime_reads: Mutex<Vec<BlockNumber>>,
}

impl MockChain {
    pub fn new(runtime: &[u8]) -> Self {
        Self {
            runtime: runtime.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_block(mut self, number: BlockNumber, snapshot: MockSnapshot) -> Self {
        self.blocks.insert(number, snapshot);
        self
    }
}

#[async_trait]
impl ChainReader for MockChain {
    type State = MockSnapshot;

    async fn block_hash(&self, number: BlockNumber) -> Result<BlockHash, AuditError> {
        Ok(hash_of(number))
    }

    async fn state_at(&self, hash: BlockHash) -> Result<MockSnapshot, AuditError> {
        let number = number_of(hash);
        self.blocks
            .get(&number)
            .cloned()
            .ok_or(AuditError::BlockNotFound(number))
    }

    async fn runtime_code(&self, hash: BlockHash) -> Result<RuntimeCode, AuditError> {
        self.runtime_reads.lock().unwrap().push(number_of(hash));
        Ok(RuntimeCode::new(self.runtime.clone()))
    }
}

// ---------------------------------------------------------------------------
// Mock fork backend
// ---------------------------------------------------------------------------

/// Operations observed by the mock backend, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForkOp {
    Open(BlockNumber),
    SetRuntime(Vec<u8>),
    Override(Vec<u8>),
    Produce,
    Close(BlockNumber),
}

/// What the corrected runtime computes when a fork at `parent` produces a block.
#[derive(Debug, Clone)]
pub struct ReplayScript {
    pub era: EraNumber,
    pub tiers: TierRewards,
    pub directory: Vec<DAppInfo>,
    pub emits_new_era: bool,
}

/// Fork backend whose forks replay scripted eras.
///
/// The tier config produced by a fork is the overridden config (or the
/// `base_config` when none was set) followed by the era number byte, so
/// tests can verify exactly what was carried forward.
#[derive(Debug, Clone)]
pub struct MockForkBackend {
    pub scripts: BTreeMap<BlockNumber, ReplayScript>,
    pub base_config: Vec<u8>,
    pub log: Arc<Mutex<Vec<ForkOp>>>,
    pub open_forks: Arc<Mutex<usize>>,
    pub fail_produce_at: Option<BlockNumber>,
    pub open_delay: Option<std::time::Duration>,
}

impl MockForkBackend {
    pub fn new(base_config: &[u8]) -> Self {
        Self {
            scripts: BTreeMap::new(),
            base_config: base_config.to_vec(),
            log: Arc::new(Mutex::new(Vec::new())),
            open_forks: Arc::new(Mutex::new(0)),
            fail_produce_at: None,
            open_delay: None,
        }
    }

    /// Script the replay of `era`, whose boundary is at `boundary_block`.
    pub fn with_era(
        mut self,
        era: EraNumber,
        boundary_block: BlockNumber,
        tiers: TierRewards,
        directory: Vec<DAppInfo>,
    ) -> Self {
        self.scripts.insert(
            boundary_block - 1,
            ReplayScript {
                era,
                tiers,
                directory,
                emits_new_era: true,
            },
        );
        self
    }

    pub fn ops(&self) -> Vec<ForkOp> {
        self.log.lock().unwrap().clone()
    }

    pub fn overrides(&self) -> Vec<Vec<u8>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                ForkOp::Override(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ForkBackend for MockForkBackend {
    type Fork = MockFork;

    async fn open_fork(&self, number: BlockNumber) -> Result<MockFork, AuditError> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        let script = self
            .scripts
            .get(&number)
            .cloned()
            .ok_or_else(|| AuditError::Fork(format!("no script for block {}", number)))?;

        {
            let mut open = self.open_forks.lock().unwrap();
            if *open != 0 {
                return Err(AuditError::Fork("forks overlap".to_string()));
            }
            *open += 1;
        }
        self.log.lock().unwrap().push(ForkOp::Open(number));

        Ok(MockFork {
            parent: number,
            script,
            base_config: self.base_config.clone(),
            fail_produce: self.fail_produce_at == Some(number),
            inner: Mutex::new(ForkInner::default()),
            log: self.log.clone(),
            open_forks: self.open_forks.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct ForkInner {
    runtime: Option<Vec<u8>>,
    config_override: Option<Vec<u8>>,
    produced: bool,
}

#[derive(Debug)]
pub struct MockFork {
    parent: BlockNumber,
    script: ReplayScript,
    base_config: Vec<u8>,
    fail_produce: bool,
    inner: Mutex<ForkInner>,
    log: Arc<Mutex<Vec<ForkOp>>>,
    open_forks: Arc<Mutex<usize>>,
}

impl MockFork {
    fn produced(&self) -> bool {
        self.inner.lock().unwrap().produced
    }
}

#[async_trait]
impl StakingState for MockFork {
    async fn protocol_state(&self) -> Result<ProtocolState, AuditError> {
        let era = if self.produced() {
            self.script.era + 1
        } else {
            self.script.era
        };
        Ok(ProtocolState {
            era,
            next_era_start: self.parent + 2,
            period: 1,
            maintenance: false,
        })
    }

    async fn tier_rewards(&self, era: EraNumber) -> Result<Option<TierRewards>, AuditError> {
        if self.produced() && era == self.script.era {
            Ok(Some(self.script.tiers.clone()))
        } else {
            Ok(None)
        }
    }

    async fn dapp_directory(&self) -> Result<Vec<DAppInfo>, AuditError> {
        Ok(self.script.directory.clone())
    }

    async fn events(&self) -> Result<Vec<ChainEvent>, AuditError> {
        if self.produced() && self.script.emits_new_era {
            Ok(vec![ChainEvent::new_era()])
        } else {
            Ok(Vec::new())
        }
    }

    async fn tier_config(&self) -> Result<Option<TierConfigBlob>, AuditError> {
        let inner = self.inner.lock().unwrap();
        let mut bytes = inner
            .config_override
            .clone()
            .unwrap_or_else(|| self.base_config.clone());
        if inner.produced {
            bytes.push(self.script.era as u8);
        }
        Ok(Some(TierConfigBlob::new(bytes)))
    }
}

#[async_trait]
impl ForkHandle for MockFork {
    async fn set_runtime(&self, code: &RuntimeCode) -> Result<(), AuditError> {
        self.inner.lock().unwrap().runtime = Some(code.as_bytes().to_vec());
        self.log
            .lock()
            .unwrap()
            .push(ForkOp::SetRuntime(code.as_bytes().to_vec()));
        Ok(())
    }

    async fn override_tier_config(&self, config: &TierConfigBlob) -> Result<(), AuditError> {
        self.inner.lock().unwrap().config_override = Some(config.as_bytes().to_vec());
        self.log
            .lock()
            .unwrap()
            .push(ForkOp::Override(config.as_bytes().to_vec()));
        Ok(())
    }

    async fn produce_block(&self) -> Result<(), AuditError> {
        self.log.lock().unwrap().push(ForkOp::Produce);
        if self.fail_produce {
            return Err(AuditError::Fork("block production failed".to_string()));
        }
        self.inner.lock().unwrap().produced = true;
        Ok(())
    }

    async fn close(self) -> Result<(), AuditError> {
        *self.open_forks.lock().unwrap() -= 1;
        self.log.lock().unwrap().push(ForkOp::Close(self.parent));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Three-era scenario
// ---------------------------------------------------------------------------

pub const A: DAppId = 1;
pub const B: DAppId = 2;
pub const C: DAppId = 3;

pub const START_BLOCK: BlockNumber = 100;
pub const END_BLOCK: BlockNumber = 135;
pub const RUNTIME: &[u8] = b"\0asm-corrected-runtime";
pub const BASE_CONFIG: &[u8] = &[0xaa, 0xbb];

pub fn scenario_directory() -> Vec<DAppInfo> {
    directory(&[(A, "A"), (B, "B"), (C, "C")])
}

/// Era 1 ends at block 110, era 2 at 120, era 3 at 130; era 4 ends past the range.
///
/// Actual rewards: era 1 {A: 100, B: 200}, era 2 {A: 50}, era 3 {C: 10}.
pub fn scenario_chain() -> MockChain {
    MockChain::new(RUNTIME)
        .with_block(START_BLOCK, MockSnapshot::at_era(1, 110))
        .with_block(
            110,
            MockSnapshot::boundary(1, 120, table(&[(A, 100), (B, 200)]), scenario_directory()),
        )
        .with_block(
            120,
            MockSnapshot::boundary(2, 130, table(&[(A, 50)]), scenario_directory()),
        )
        .with_block(
            130,
            MockSnapshot::boundary(3, 140, table(&[(C, 10)]), scenario_directory()),
        )
}

/// Expected rewards: era 1 {A: 150, B: 200}, era 2 {A: `era2_a`}, era 3 {C: 40}.
pub fn scenario_backend(era2_a: Balance) -> MockForkBackend {
    MockForkBackend::new(BASE_CONFIG)
        .with_era(1, 110, table(&[(A, 150), (B, 200)]), scenario_directory())
        .with_era(2, 120, table(&[(A, era2_a)]), scenario_directory())
        .with_era(3, 130, table(&[(C, 40)]), scenario_directory())
}
