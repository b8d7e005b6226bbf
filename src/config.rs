//! Client configuration.

use crate::ledger::{Address, ENTRY_STAKE_WEI, Stake};
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Configuration for one session client.
#[derive(Debug, Clone, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct ClientConfig {
    /// Address of the signing account.
    signer: String,

    /// Entry stake in wei; must match the deployed contract.
    #[serde(default = "default_entry_stake_wei")]
    entry_stake_wei: u64,

    /// Address of the session contract, for display and logging.
    #[serde(default)]
    ledger_address: Option<String>,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    log_filter: String,

    /// Where to persist the current session between runs.
    #[serde(default)]
    snapshot_path: Option<PathBuf>,
}

fn default_entry_stake_wei() -> u64 {
    ENTRY_STAKE_WEI
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the signer.
    #[instrument(skip(signer))]
    pub fn new(signer: impl Into<String>) -> Self {
        Self {
            signer: signer.into(),
            entry_stake_wei: default_entry_stake_wei(),
            ledger_address: None,
            log_filter: default_log_filter(),
            snapshot_path: None,
        }
    }

    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(signer = %config.signer, "Config loaded successfully");
        Ok(config)
    }

    /// The signer as a ledger address.
    pub fn signer_address(&self) -> Address {
        Address::new(self.signer.clone())
    }

    /// The entry stake as a [`Stake`].
    pub fn entry_stake(&self) -> Stake {
        Stake::from_wei(u128::from(self.entry_stake_wei))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let hex = self.signer.strip_prefix("0x").unwrap_or(&self.signer);
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::new(format!(
                "Signer {:?} is not a hex address",
                self.signer
            )));
        }
        if self.entry_stake_wei == 0 {
            return Err(ConfigError::new("Entry stake must be positive"));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
