use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::blockchain::networks::{NetworkParams, NetworkRegistry, TargetNetwork};
use crate::core::errors::SessionError;

pub const CONFIG_PATH_ENV: &str = "WALLET_SESSION_CONFIG";
pub const RPC_URL_ENV: &str = "WALLET_SESSION_RPC_URL";
pub const HANDSHAKE_MS_ENV: &str = "WALLET_SESSION_HANDSHAKE_MS";
pub const DEFAULT_CONFIG_PATH: &str = "wallet-session.toml";

/// Simulated (relay / non-EVM) provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedProviderConfig {
    /// Fixed handshake delay (milliseconds)
    #[serde(default = "SimulatedProviderConfig::default_handshake_delay_ms")]
    pub handshake_delay_ms: u64,

    #[serde(default = "SimulatedProviderConfig::default_relay_account")]
    pub relay_account: String,

    #[serde(default = "SimulatedProviderConfig::default_relay_chain_id")]
    pub relay_chain_id: u64,

    #[serde(default = "SimulatedProviderConfig::default_phantom_account")]
    pub phantom_account: String,
}

impl SimulatedProviderConfig {
    fn default_handshake_delay_ms() -> u64 { 1500 }
    fn default_relay_account() -> String { "0xWalletConnect...1234".to_string() }
    fn default_relay_chain_id() -> u64 { 137 }
    fn default_phantom_account() -> String { "Phantom...5678".to_string() }

    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }
}

impl Default for SimulatedProviderConfig {
    fn default() -> Self {
        Self {
            handshake_delay_ms: Self::default_handshake_delay_ms(),
            relay_account: Self::default_relay_account(),
            relay_chain_id: Self::default_relay_chain_id(),
            phantom_account: Self::default_phantom_account(),
        }
    }
}

/// Injected (EIP-1193) provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedProviderConfig {
    /// JSON-RPC endpoint standing in for the injected wallet. Absent means
    /// no injected provider is available.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// HTTP request timeout (seconds)
    #[serde(default = "InjectedProviderConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl InjectedProviderConfig {
    fn default_request_timeout_secs() -> u64 { 10 }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for InjectedProviderConfig {
    fn default() -> Self {
        Self { rpc_url: None, request_timeout_secs: Self::default_request_timeout_secs() }
    }
}

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub target: TargetNetwork,

    #[serde(default)]
    pub simulated: SimulatedProviderConfig,

    #[serde(default)]
    pub injected: InjectedProviderConfig,

    /// Extra or replacement entries for the network parameter table
    #[serde(default)]
    pub networks: Vec<NetworkParams>,
}

impl SessionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SessionError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a config file; the file must exist.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), networks = config.networks.len(), "Loaded session config");
        Ok(config)
    }

    /// Resolves the config from the environment.
    ///
    /// An explicit `WALLET_SESSION_CONFIG` must point at a readable file; the
    /// default path is optional and falls back to defaults. Env overrides are
    /// applied last.
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(&path)?
                } else {
                    info!("No {} found, using default configuration", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), SessionError> {
        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.injected.rpc_url = Some(url.to_string());
            }
        }
        if let Ok(raw) = std::env::var(HANDSHAKE_MS_ENV) {
            self.simulated.handshake_delay_ms = raw.trim().parse().map_err(|e| {
                SessionError::Config(format!("{} must be an integer: {}", HANDSHAKE_MS_ENV, e))
            })?;
        }
        Ok(())
    }

    /// Built-in network table with this config's entries layered on top.
    pub fn network_registry(&self) -> NetworkRegistry {
        let mut registry = NetworkRegistry::builtin();
        for params in &self.networks {
            registry.insert(params.clone());
        }
        registry
    }
}
