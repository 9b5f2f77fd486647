use ethers::{
    contract::ContractError,
    providers::{
        Middleware,
        ProviderError,
    },
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no wallet loaded; unlock a wallet or provide a private key first")]
    WalletMissing,
    #[error("rpc is on chain {actual}, expected chain {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("transaction was dropped before it was mined")]
    Dropped,
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("invalid tier {0}; expected 0, 1 or 2")]
    InvalidTier(u8),
    #[error("tile {0} is outside the 25 tile board")]
    InvalidTile(u8),
    #[error("contract reported unknown game state {0}")]
    UnknownState(u8),
    #[error("could not decode contract value: {0}")]
    Decode(String),
    #[error("keystore error: {0}")]
    Keystore(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Failures a poll loop may skip and retry on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Rpc(_) | Error::Dropped)
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::Rpc(err.to_string())
    }
}

impl<M: Middleware> From<ContractError<M>> for Error {
    fn from(err: ContractError<M>) -> Self {
        if let Some(reason) = err.decode_revert::<String>() {
            return Error::Reverted(reason);
        }
        if err.is_revert() {
            return Error::Reverted("execution reverted".to_string());
        }
        Error::Rpc(err.to_string())
    }
}
