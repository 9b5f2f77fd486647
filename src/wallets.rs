use crate::error::{
    Error,
    Result,
};
use eth_keystore::decrypt_key;
use ethers::signers::{
    LocalWallet,
    MnemonicBuilder,
    coins_bip39::English,
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

const KEYSTORE_EXTENSIONS: [&str; 2] = ["json", "wallet"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::Config("HOME environment variable not set".to_string()))?;
    Ok(PathBuf::from(home).join(".danger-tiles").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::Keystore(format!("failed to read {}: {e}", dir.display())))?;
    let mut wallets = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| Error::Keystore(format!("failed to read wallet entry: {e}")))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_keystore = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| KEYSTORE_EXTENSIONS.contains(&ext));
        if !is_keystore {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| Error::Keystore(format!("invalid wallet filename {path:?}")))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    list_wallets(dir)?
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| {
            Error::Keystore(format!("wallet '{name}' not found in {}", dir.display()))
        })
}

/// Prompts for the keystore password on the terminal and decrypts it.
pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<LocalWallet> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt)
        .map_err(|e| Error::Keystore(format!("failed to read wallet password: {e}")))?;
    unlock_wallet_with_password(descriptor, &password)
}

pub fn unlock_wallet_with_password(
    descriptor: &WalletDescriptor,
    password: &str,
) -> Result<LocalWallet> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes()).map_err(|_| {
        Error::Keystore(format!("invalid password for wallet '{}'", descriptor.name))
    })?;
    if let Ok(wallet) = LocalWallet::from_bytes(&secret) {
        return Ok(wallet);
    }

    if let Ok(phrase) = std::str::from_utf8(&secret) {
        if phrase.split_whitespace().count() >= 12 {
            return MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .build()
                .map_err(|e| Error::Keystore(format!("invalid mnemonic: {e}")));
        }
    }

    Err(Error::Keystore(format!(
        "wallet '{}' contained unsupported key material",
        descriptor.name
    )))
}

/// Hex private key, with or without `0x`.
pub fn wallet_from_hex(raw: &str) -> Result<LocalWallet> {
    let trimmed = raw.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|_| Error::Keystore("private key is not valid hex".to_string()))?;
    LocalWallet::from_bytes(&bytes)
        .map_err(|_| Error::Keystore("private key is not a valid secp256k1 key".to_string()))
}

/// Reads a hex private key from `var`. A missing or empty variable is a
/// configuration error.
pub fn wallet_from_env(var: &str) -> Result<LocalWallet> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => wallet_from_hex(&raw),
        _ => Err(Error::Config(format!("{var} is not set"))),
    }
}
