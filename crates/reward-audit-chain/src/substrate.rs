// crates/reward-audit-chain/src/substrate.rs
//
// Archive-node access over WebSocket via subxt's dynamic (metadata-driven)
// storage and event APIs.

use async_trait::async_trait;
use subxt::backend::legacy::LegacyRpcMethods;
use subxt::backend::rpc::RpcClient;
use subxt::dynamic::Value;
use subxt::utils::H256;
use subxt::{OnlineClient, PolkadotConfig};

use reward_audit_core::{
    AuditError, BlockHash, BlockNumber, ChainEvent, ChainReader, DAppInfo, EraNumber,
    ProtocolState, RuntimeCode, StakingState, TierConfigBlob, TierRewards, STAKING_PALLET,
};

use crate::decode;

/// Well-known storage key holding the runtime WASM blob.
pub const CODE_KEY: &[u8] = b":code";

pub(crate) fn rpc_err(e: subxt::Error) -> AuditError {
    AuditError::Rpc(e.to_string())
}

/// Storage value that does not decode against the runtime metadata.
fn value_err(e: impl std::fmt::Display) -> AuditError {
    AuditError::Decode(e.to_string())
}

/// Connected subxt client plus the raw RPC handle used for legacy calls.
#[derive(Clone)]
pub struct SubstrateClient {
    rpc: RpcClient,
    api: OnlineClient<PolkadotConfig>,
}

impl SubstrateClient {
    /// Connect to `url` and fetch the metadata of its best block.
    ///
    /// `ws://` and `http://` URLs are accepted; local forks never use TLS.
    pub async fn connect(url: &str) -> Result<Self, AuditError> {
        let rpc = if url.starts_with("ws://") || url.starts_with("http://") {
            RpcClient::from_insecure_url(url).await
        } else {
            RpcClient::from_url(url).await
        }
        .map_err(rpc_err)?;
        let api = OnlineClient::<PolkadotConfig>::from_rpc_client(rpc.clone())
            .await
            .map_err(rpc_err)?;
        tracing::debug!(url = %url, "Connected to chain");
        Ok(Self { rpc, api })
    }

    fn legacy(&self) -> LegacyRpcMethods<PolkadotConfig> {
        LegacyRpcMethods::new(self.rpc.clone())
    }

    /// Hash of canonical block `number`.
    pub async fn block_hash(&self, number: BlockNumber) -> Result<BlockHash, AuditError> {
        self.legacy()
            .chain_get_block_hash(Some(number.into()))
            .await
            .map_err(rpc_err)?
            .map(|hash| BlockHash(hash.0))
            .ok_or(AuditError::BlockNotFound(number))
    }

    /// Hash of the current best block.
    pub async fn head_hash(&self) -> Result<BlockHash, AuditError> {
        self.legacy()
            .chain_get_block_hash(None)
            .await
            .map_err(rpc_err)?
            .map(|hash| BlockHash(hash.0))
            .ok_or_else(|| AuditError::Rpc("node reported no best block".to_string()))
    }

    /// Raw storage key of the tier threshold configuration entry.
    pub fn tier_config_key(&self) -> Result<Vec<u8>, AuditError> {
        let address = subxt::dynamic::storage(STAKING_PALLET, "TierConfig", ());
        self.api.storage().address_bytes(&address).map_err(rpc_err)
    }

    /// Storage and events as of `hash`.
    pub fn state(&self, hash: BlockHash) -> SubstrateState {
        SubstrateState {
            client: self.clone(),
            hash,
        }
    }
}

/// [`ChainReader`] over a Substrate archive node.
pub struct SubstrateReader {
    client: SubstrateClient,
}

impl SubstrateReader {
    pub async fn connect(endpoint: &str) -> Result<Self, AuditError> {
        Ok(Self {
            client: SubstrateClient::connect(endpoint).await?,
        })
    }
}

#[async_trait]
impl ChainReader for SubstrateReader {
    type State = SubstrateState;

    async fn block_hash(&self, number: BlockNumber) -> Result<BlockHash, AuditError> {
        self.client.block_hash(number).await
    }

    async fn state_at(&self, hash: BlockHash) -> Result<SubstrateState, AuditError> {
        Ok(self.client.state(hash))
    }

    async fn runtime_code(&self, hash: BlockHash) -> Result<RuntimeCode, AuditError> {
        self.client
            .api
            .storage()
            .at(H256(hash.0))
            .fetch_raw(CODE_KEY.to_vec())
            .await
            .map_err(rpc_err)?
            .map(RuntimeCode::new)
            .ok_or_else(|| AuditError::Rpc(format!("no runtime code at {}", hash)))
    }
}

/// Reward pallet storage and block events at one block.
pub struct SubstrateState {
    client: SubstrateClient,
    hash: BlockHash,
}

impl SubstrateState {
    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    fn at(&self) -> H256 {
        H256(self.hash.0)
    }
}

#[async_trait]
impl StakingState for SubstrateState {
    async fn protocol_state(&self) -> Result<ProtocolState, AuditError> {
        let address = subxt::dynamic::storage(STAKING_PALLET, "ActiveProtocolState", ());
        let thunk = self
            .client
            .api
            .storage()
            .at(self.at())
            .fetch(&address)
            .await
            .map_err(rpc_err)?
            .ok_or_else(|| AuditError::Rpc(format!("no protocol state at {}", self.hash)))?;
        decode::protocol_state(&thunk.to_value().map_err(value_err)?)
    }

    async fn tier_rewards(&self, era: EraNumber) -> Result<Option<TierRewards>, AuditError> {
        let address = subxt::dynamic::storage(
            STAKING_PALLET,
            "DAppTiers",
            vec![Value::u128(era as u128)],
        );
        let thunk = self
            .client
            .api
            .storage()
            .at(self.at())
            .fetch(&address)
            .await
            .map_err(rpc_err)?;
        match thunk {
            Some(thunk) => Ok(Some(decode::tier_rewards(
                &thunk.to_value().map_err(value_err)?,
            )?)),
            None => Ok(None),
        }
    }

    async fn dapp_directory(&self) -> Result<Vec<DAppInfo>, AuditError> {
        let address =
            subxt::dynamic::storage(STAKING_PALLET, "IntegratedDApps", Vec::<Value>::new());
        let mut entries = self
            .client
            .api
            .storage()
            .at(self.at())
            .iter(address)
            .await
            .map_err(rpc_err)?;

        let mut directory = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry.map_err(rpc_err)?;
            directory.push(decode::dapp_info(&entry.value.to_value().map_err(value_err)?)?);
        }
        tracing::debug!(hash = %self.hash, dapps = directory.len(), "Read dApp directory");
        Ok(directory)
    }

    async fn events(&self) -> Result<Vec<ChainEvent>, AuditError> {
        let events = self
            .client
            .api
            .events()
            .at(self.at())
            .await
            .map_err(rpc_err)?;
        events
            .iter()
            .map(|event| {
                let event = event.map_err(|e| {
                    AuditError::Decode(format!("event at {}: {}", self.hash, e))
                })?;
                Ok(ChainEvent::new(event.pallet_name(), event.variant_name()))
            })
            .collect()
    }

    async fn tier_config(&self) -> Result<Option<TierConfigBlob>, AuditError> {
        let key = self.client.tier_config_key()?;
        let raw = self
            .client
            .api
            .storage()
            .at(self.at())
            .fetch_raw(key)
            .await
            .map_err(rpc_err)?;
        Ok(raw.map(TierConfigBlob::new))
    }
}
