use ethers::types::Address;
use sha2::{
    Digest,
    Sha256,
};

pub mod danger_tiles_types {
    use ethers::contract::abigen;

    abigen!(DangerTiles, "abi/DangerTiles.json");
}

pub use danger_tiles_types::DangerTiles;

/// Raw JSON ABI the bindings are generated from.
pub const ABI_JSON: &str = include_str!("../abi/DangerTiles.json");

/// SHA-256 of the bundled ABI, hex encoded. Deployment records carry the same
/// fingerprint so a client can tell when it talks to a contract built from a
/// different interface.
pub fn abi_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(ABI_JSON.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn contract_instance<M: ethers::providers::Middleware>(
    address: Address,
    client: std::sync::Arc<M>,
) -> DangerTiles<M> {
    DangerTiles::new(address, client)
}
