pub mod client;
pub mod error;
pub mod history;
pub mod lobby;
pub mod logging;
pub mod reconciler;
pub mod tiles;
pub mod types;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use client::{
    Confirmed,
    ContractClient,
    GameContract,
    format_mon,
    join_with_required_payment,
};
pub use error::{
    Error,
    Result,
};
pub use reconciler::{
    GameEvent,
    GameResult,
    Reconciler,
};
pub use tiles::{
    RevealedTiles,
    TileView,
};
pub use types::{
    GRID_SIZE,
    GameData,
    GameState,
    Seat,
    Tier,
};

pub use generated_abi::{
    abi_hash,
    danger_tiles_types,
};

use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
    record_deployment,
};
use ethers::types::{
    Address,
    H256,
};
use tracing::warn;

/// Network settings after applying the on-disk record and CLI overrides.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub env: DeploymentEnv,
    pub chain_id: u64,
    pub rpc_url: String,
    pub contract: Address,
    pub record: DeploymentRecord,
}

impl NetworkConfig {
    /// Explorer link for a transaction, when the network has an explorer.
    pub fn tx_url(&self, tx_hash: H256) -> Option<String> {
        self.record.tx_url(&format!("{tx_hash:?}"))
    }
}

/// Resolves the deployment for `env`, then applies `--rpc-url` and
/// `--contract`. An ABI fingerprint mismatch only warns.
pub fn resolve_network(
    store: &DeploymentStore,
    rpc_override: Option<&str>,
    contract_override: Option<&str>,
) -> Result<NetworkConfig> {
    let record: DeploymentRecord = store
        .resolve()
        .map_err(|e| Error::Config(format!("{e:#}")))?;
    if !record.is_compatible_with_hash(&abi_hash()) {
        warn!(
            env = %store.env(),
            "deployment record was made for a different contract ABI"
        );
    }
    let contract_raw = match contract_override {
        Some(addr) => addr.to_string(),
        None => record
            .contract_address()
            .map_err(|e| Error::Config(format!("{e:#}")))?
            .to_string(),
    };
    let contract = contract_raw
        .parse::<Address>()
        .map_err(|e| Error::Config(format!("invalid contract address {contract_raw}: {e}")))?;
    Ok(NetworkConfig {
        env: store.env(),
        chain_id: record.chain_id,
        rpc_url: rpc_override
            .map(str::to_string)
            .unwrap_or_else(|| record.rpc_url.clone()),
        contract,
        record,
    })
}

/// Stores `contract` as the deployment for the store's network, stamped with
/// the bundled ABI fingerprint. `rpc_override` replaces the recorded RPC URL.
pub fn record_contract(
    store: &DeploymentStore,
    contract: Address,
    rpc_override: Option<&str>,
) -> Result<DeploymentRecord> {
    let current = store
        .resolve()
        .map_err(|e| Error::Config(format!("{e:#}")))?;
    let rpc_url = rpc_override.unwrap_or(&current.rpc_url);
    record_deployment(
        store,
        format!("{contract:?}"),
        rpc_url,
        current.chain_id,
        abi_hash(),
    )
    .map_err(|e| Error::Config(format!("{e:#}")))
}
