use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub const TESTNET_CHAIN_ID: u64 = 10143;
pub const TESTNET_RPC_URL: &str = "https://testnet-rpc.monad.xyz";
pub const TESTNET_CONTRACT_ADDRESS: &str = "0xE6D70350224FA26aC9d0F88D0110F44e0F8f36C4";
pub const TESTNET_EXPLORER_URL: &str = "https://testnet.monadexplorer.com";

pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const LOCAL_RPC_URL: &str = "http://localhost:8545";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Testnet,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Testnet => "testnet",
            DeploymentEnv::Local => "local",
        }
    }

    /// Network parameters the game ships with. The local network has no known
    /// contract address, so it only becomes usable through a stored record or
    /// an explicit override.
    pub fn default_record(self) -> DeploymentRecord {
        match self {
            DeploymentEnv::Testnet => DeploymentRecord {
                chain_id: TESTNET_CHAIN_ID,
                chain_name: "Monad Testnet".to_string(),
                rpc_url: TESTNET_RPC_URL.to_string(),
                contract_address: Some(TESTNET_CONTRACT_ADDRESS.to_string()),
                explorer_url: Some(TESTNET_EXPLORER_URL.to_string()),
                currency_symbol: "MON".to_string(),
                abi_hash: None,
                recorded_at: None,
            },
            DeploymentEnv::Local => DeploymentRecord {
                chain_id: LOCAL_CHAIN_ID,
                chain_name: "Local".to_string(),
                rpc_url: LOCAL_RPC_URL.to_string(),
                contract_address: None,
                explorer_url: None,
                currency_symbol: "MON".to_string(),
                abi_hash: None,
                recorded_at: None,
            },
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Testnet => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_url: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default)]
    pub abi_hash: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<String>,
}

fn default_currency_symbol() -> String {
    "MON".to_string()
}

impl DeploymentRecord {
    /// A record without a fingerprint predates fingerprinting and is trusted.
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.abi_hash.as_deref().is_none_or(|stored| stored == hash)
    }

    pub fn contract_address(&self) -> Result<&str> {
        self.contract_address.as_deref().ok_or_else(|| {
            anyhow!(
                "No contract address known for chain {} ({}); record one or pass --contract",
                self.chain_name,
                self.chain_id
            )
        })
    }

    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url
            .as_deref()
            .map(|base| format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::with_root(env, DEPLOYMENTS_ROOT)
    }

    pub fn with_root(env: DeploymentEnv, root: impl AsRef<Path>) -> Result<Self> {
        let path = ensure_store(env, root.as_ref())?;
        Ok(Self { env, path })
    }

    pub fn env(&self) -> DeploymentEnv {
        self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_record(&self.path, &record)
    }

    /// Stored override if one exists, otherwise the built-in defaults.
    pub fn resolve(&self) -> Result<DeploymentRecord> {
        Ok(self
            .load()?
            .unwrap_or_else(|| self.env.default_record()))
    }
}

pub fn record_deployment(
    store: &DeploymentStore,
    contract_address: impl AsRef<str>,
    rpc_url: impl AsRef<str>,
    chain_id: u64,
    abi_hash: impl AsRef<str>,
) -> Result<DeploymentRecord> {
    let mut record = store.resolve()?;
    record.chain_id = chain_id;
    record.rpc_url = rpc_url.as_ref().to_string();
    record.contract_address = Some(contract_address.as_ref().to_string());
    record.abi_hash = Some(abi_hash.as_ref().to_string());
    record.recorded_at = Some(Utc::now().to_rfc3339());
    store.save(record.clone())?;
    Ok(record)
}

fn ensure_store(env: DeploymentEnv, root: &Path) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!(
                "Failed to create deployment directory {}",
                env_dir.display()
            )
        })?;
    }
    Ok(env_dir.join(DEPLOYMENTS_FILE))
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path).context("Failed to read deployment records")?;
    if data.is_empty() || data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON at {}; expected a single deployment object",
        path.display()
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}
