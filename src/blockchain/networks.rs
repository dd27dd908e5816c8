//! Network parameter table used by the "register network" fallback of a
//! chain switch, plus the target-network predicate.
//!
//! `NetworkParams` serializes in the exact shape `wallet_addEthereumChain`
//! expects (camelCase keys, hex `chainId`).

use std::collections::BTreeMap;

use ethers::types::U64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::SessionError;

pub const ETHEREUM_MAINNET: u64 = 1;
pub const OPTIMISM_MAINNET: u64 = 10;
pub const POLYGON_MAINNET: u64 = 137;
pub const POLYGON_MUMBAI: u64 = 80001;
pub const SEPOLIA: u64 = 11155111;

/// Native currency metadata of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters handed to the provider when registering a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    #[serde(alias = "chain_id", with = "chain_id_hex")]
    pub chain_id: u64,
    #[serde(alias = "chain_name")]
    pub chain_name: String,
    #[serde(alias = "native_currency")]
    pub native_currency: NativeCurrency,
    #[serde(alias = "rpc_urls")]
    pub rpc_urls: Vec<String>,
    #[serde(alias = "block_explorer_urls", default)]
    pub block_explorer_urls: Vec<String>,
}

impl NetworkParams {
    fn new(
        chain_id: u64,
        chain_name: &str,
        currency: (&str, &str, u8),
        rpc_url: &str,
        explorer_url: &str,
    ) -> Self {
        Self {
            chain_id,
            chain_name: chain_name.to_string(),
            native_currency: NativeCurrency {
                name: currency.0.to_string(),
                symbol: currency.1.to_string(),
                decimals: currency.2,
            },
            rpc_urls: vec![rpc_url.to_string()],
            block_explorer_urls: vec![explorer_url.to_string()],
        }
    }
}

/// Formats a chain id the way EIP-1193 providers expect it (`0x89`).
pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("{:#x}", chain_id)
}

/// Parses a chain id from either a `0x`-prefixed hex string or a decimal string.
pub fn parse_chain_id(raw: &str) -> Result<u64, SessionError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse::<u64>(),
    };
    parsed.map_err(|e| SessionError::TransientFailure(format!("Invalid chain id '{}': {}", raw, e)))
}

/// Decodes an `eth_chainId` response. Providers answer with a hex quantity,
/// a few legacy ones with a plain number.
pub fn chain_id_from_value(value: &serde_json::Value) -> Result<u64, SessionError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    serde_json::from_value::<U64>(value.clone()).map(|id| id.as_u64()).map_err(|e| {
        SessionError::TransientFailure(format!("Invalid chain id response {}: {}", value, e))
    })
}

mod chain_id_hex {
    use super::*;

    pub fn serialize<S: Serializer>(chain_id: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&to_hex_chain_id(*chain_id))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => parse_chain_id(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Designated target network: a primary id plus an accepted alternate
/// (typically its testnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNetwork {
    pub primary_chain_id: u64,
    #[serde(default)]
    pub alternate_chain_id: Option<u64>,
}

impl TargetNetwork {
    pub fn accepts(&self, chain_id: u64) -> bool {
        chain_id == self.primary_chain_id || self.alternate_chain_id == Some(chain_id)
    }
}

impl Default for TargetNetwork {
    fn default() -> Self {
        Self { primary_chain_id: POLYGON_MAINNET, alternate_chain_id: Some(POLYGON_MUMBAI) }
    }
}

/// Static table of chain id -> registration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRegistry {
    networks: BTreeMap<u64, NetworkParams>,
}

impl NetworkRegistry {
    pub fn empty() -> Self {
        Self { networks: BTreeMap::new() }
    }

    /// The chains the chat front end knows how to register.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(NetworkParams::new(
            ETHEREUM_MAINNET,
            "Ethereum Mainnet",
            ("Ether", "ETH", 18),
            "https://eth.llamarpc.com",
            "https://etherscan.io/",
        ));
        registry.insert(NetworkParams::new(
            OPTIMISM_MAINNET,
            "Optimism",
            ("Ether", "ETH", 18),
            "https://mainnet.optimism.io",
            "https://optimistic.etherscan.io/",
        ));
        registry.insert(NetworkParams::new(
            POLYGON_MAINNET,
            "Polygon Mainnet",
            ("MATIC", "MATIC", 18),
            "https://polygon-rpc.com/",
            "https://polygonscan.com/",
        ));
        registry.insert(NetworkParams::new(
            POLYGON_MUMBAI,
            "Polygon Mumbai",
            ("MATIC", "MATIC", 18),
            "https://rpc-mumbai.maticvigil.com/",
            "https://mumbai.polygonscan.com/",
        ));
        registry.insert(NetworkParams::new(
            SEPOLIA,
            "Sepolia Testnet",
            ("Sepolia Ether", "ETH", 18),
            "https://rpc.sepolia.org",
            "https://sepolia.etherscan.io/",
        ));
        registry
    }

    /// Adds or replaces the entry for `params.chain_id`.
    pub fn insert(&mut self, params: NetworkParams) -> Option<NetworkParams> {
        self.networks.insert(params.chain_id, params)
    }

    pub fn get(&self, chain_id: u64) -> Option<&NetworkParams> {
        self.networks.get(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkParams> {
        self.networks.values()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_polygon_params_serialize_as_add_chain_payload() {
        let registry = NetworkRegistry::builtin();
        let polygon = registry.get(POLYGON_MAINNET).unwrap();

        assert_eq!(
            serde_json::to_value(polygon).unwrap(),
            json!({
                "chainId": "0x89",
                "chainName": "Polygon Mainnet",
                "nativeCurrency": { "name": "MATIC", "symbol": "MATIC", "decimals": 18 },
                "rpcUrls": ["https://polygon-rpc.com/"],
                "blockExplorerUrls": ["https://polygonscan.com/"]
            })
        );
    }

    #[test]
    fn test_params_deserialize_from_snake_case_and_decimal_id() {
        let params: NetworkParams = serde_json::from_value(json!({
            "chain_id": 42161,
            "chain_name": "Arbitrum One",
            "native_currency": { "name": "Ether", "symbol": "ETH", "decimals": 18 },
            "rpc_urls": ["https://arb1.arbitrum.io/rpc"]
        }))
        .unwrap();

        assert_eq!(params.chain_id, 42161);
        assert!(params.block_explorer_urls.is_empty());
    }

    #[test]
    fn test_chain_id_parsing() {
        assert_eq!(to_hex_chain_id(137), "0x89");
        assert_eq!(parse_chain_id("0x89").unwrap(), 137);
        assert_eq!(parse_chain_id("80001").unwrap(), 80001);
        assert!(parse_chain_id("0xzz").is_err());

        assert_eq!(chain_id_from_value(&json!("0x1")).unwrap(), 1);
        assert_eq!(chain_id_from_value(&json!(137)).unwrap(), 137);
        assert!(chain_id_from_value(&json!(null)).is_err());
    }

    #[test]
    fn test_default_target_accepts_polygon_and_mumbai() {
        let target = TargetNetwork::default();
        assert!(target.accepts(POLYGON_MAINNET));
        assert!(target.accepts(POLYGON_MUMBAI));
        assert!(!target.accepts(ETHEREUM_MAINNET));
        assert!(!target.accepts(0));
    }
}
