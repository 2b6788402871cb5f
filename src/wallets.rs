use crate::types::Address;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

/// Env var holding the keystore password for unattended runs. When unset the
/// operator is prompted once per wallet.
pub const WALLET_PASSWORD_ENV: &str = "CHAMBER_WALLET_PASSWORD";

#[derive(Clone, Debug)]
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

/// An unlocked agent identity: its on-ledger address plus the secret used to
/// sign write calls.
#[derive(Clone)]
pub struct AgentKey {
    pub name: String,
    pub address: Address,
    secret: Vec<u8>,
}

impl AgentKey {
    pub fn new(name: impl Into<String>, address: Address, secret: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            address,
            secret,
        }
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl std::fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentKey")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".chamber").join("wallets"))
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
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

/// Keystore files carry the account address alongside the encrypted key.
fn keystore_address(path: &Path) -> Result<Address> {
    let raw = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read keystore {:?}", path))?;
    let json: serde_json::Value =
        serde_json::from_str(&raw).wrap_err("Keystore is not valid JSON")?;
    let address = json
        .get("address")
        .and_then(|v| v.as_str())
        .ok_or_else(|| eyre!("Keystore {:?} has no address field", path))?;
    let address = address.trim_start_matches("0x");
    Ok(Address::new(format!("0x{}", address.to_lowercase())))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<AgentKey> {
    let password = match std::env::var(WALLET_PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => {
            let prompt =
                format!("Enter password for wallet '{}': ", descriptor.name);
            prompt_password(prompt).wrap_err("Failed to read wallet password")?
        }
    };

    let address = keystore_address(&descriptor.path)?;
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    Ok(AgentKey::new(descriptor.name.clone(), address, secret))
}

/// Unlock every requested wallet. With no explicit names, the whole directory
/// becomes the managed roster.
pub fn load_roster(dir: &Path, names: &[String]) -> Result<Vec<AgentKey>> {
    let available = list_wallets(dir)?;
    let selected: Vec<WalletDescriptor> = if names.is_empty() {
        available
    } else {
        names
            .iter()
            .map(|name| {
                available
                    .iter()
                    .find(|w| &w.name == name)
                    .cloned()
                    .ok_or_else(|| {
                        eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy())
                    })
            })
            .collect::<Result<_>>()?
    };

    if selected.is_empty() {
        return Err(eyre!(
            "No agent wallets found in {}",
            dir.to_string_lossy()
        ));
    }

    selected.iter().map(unlock_wallet).collect()
}
