//! External account session: provider kinds, connection phases and the
//! session record the [`SessionManager`] owns.
//!
//! Only the manager mutates a [`Session`]. Everyone else works with the
//! clones it publishes, which expose getters but no setters.

pub mod cache;
pub mod manager;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    blockchain::{
        networks::{ETHEREUM_MAINNET, OPTIMISM_MAINNET, POLYGON_MAINNET},
        traits::Handshake,
    },
    core::errors::SessionError,
};

pub use cache::{CacheRegistry, MemoryCache, SessionCache};
pub use manager::{SessionManager, SessionManagerBuilder};

/// How the current account was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    #[serde(rename = "none")]
    NoneConnected,
    /// Injected EVM wallet (EIP-1193).
    #[serde(rename = "metamask")]
    MetaMask,
    /// Remote-relay EVM wallet.
    #[serde(rename = "walletconnect")]
    WalletConnect,
    /// Non-EVM wallet.
    #[serde(rename = "phantom")]
    Phantom,
}

impl ProviderKind {
    /// Every kind that can back a session.
    pub const ALL: [ProviderKind; 3] =
        [ProviderKind::MetaMask, ProviderKind::WalletConnect, ProviderKind::Phantom];

    pub fn is_evm(self) -> bool {
        match self {
            ProviderKind::MetaMask | ProviderKind::WalletConnect => true,
            ProviderKind::Phantom | ProviderKind::NoneConnected => false,
        }
    }

    pub fn supports_network_switch(self) -> bool {
        match self {
            ProviderKind::MetaMask => true,
            ProviderKind::WalletConnect | ProviderKind::Phantom | ProviderKind::NoneConnected => {
                false
            }
        }
    }

    /// Whether already-authorized accounts can be picked up without a prompt.
    pub fn supports_silent_restore(self) -> bool {
        match self {
            ProviderKind::MetaMask => true,
            ProviderKind::WalletConnect | ProviderKind::Phantom | ProviderKind::NoneConnected => {
                false
            }
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ProviderKind::NoneConnected => "none",
            ProviderKind::MetaMask => "metamask",
            ProviderKind::WalletConnect => "walletconnect",
            ProviderKind::Phantom => "phantom",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::NoneConnected => "No wallet",
            ProviderKind::MetaMask => "MetaMask",
            ProviderKind::WalletConnect => "WalletConnect",
            ProviderKind::Phantom => "Phantom",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ProviderKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metamask" => Ok(ProviderKind::MetaMask),
            "walletconnect" => Ok(ProviderKind::WalletConnect),
            "phantom" => Ok(ProviderKind::Phantom),
            other => Err(SessionError::InvalidProvider(other.to_string())),
        }
    }
}

/// Connection lifecycle; doubles as the mutual-exclusion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionPhase::Idle => "idle",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

/// The current external-account connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    provider_kind: ProviderKind,
    account_address: Option<String>,
    network_id: Option<u64>,
    connection_phase: ConnectionPhase,
    last_error: Option<String>,
    epoch: u64,
    connected_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider_kind
    }

    pub fn account_address(&self) -> Option<&str> {
        self.account_address.as_deref()
    }

    /// Chain id; only meaningful when the provider kind is EVM-style.
    pub fn network_id(&self) -> Option<u64> {
        self.network_id
    }

    pub fn connection_phase(&self) -> ConnectionPhase {
        self.connection_phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Bumped whenever the session is torn down or re-established.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    pub fn is_connected(&self) -> bool {
        self.connection_phase == ConnectionPhase::Connected
    }

    /// Empty session with nothing attached.
    pub fn is_empty(&self) -> bool {
        self.provider_kind == ProviderKind::NoneConnected
            && self.account_address.is_none()
            && self.network_id.is_none()
            && self.connection_phase == ConnectionPhase::Idle
    }

    /// Account present iff connected, and only with a provider attached.
    pub fn invariants_hold(&self) -> bool {
        let connected = self.connection_phase == ConnectionPhase::Connected;
        let attached = self.provider_kind != ProviderKind::NoneConnected;
        self.account_address.is_some() == connected && attached == connected
    }

    /// `0x1234...abcd` for EVM addresses; ids that are not `0x`-prefixed are
    /// shown as-is.
    pub fn short_address(&self) -> Option<String> {
        let address = self.account_address.as_deref()?;
        if !address.starts_with("0x") || address.len() <= 10 {
            return Some(address.to_string());
        }
        match (address.get(..6), address.get(address.len() - 4..)) {
            (Some(head), Some(tail)) => Some(format!("{}...{}", head, tail)),
            _ => Some(address.to_string()),
        }
    }

    /// Label of the connect/disconnect control.
    pub fn status_label(&self) -> &'static str {
        match self.connection_phase {
            ConnectionPhase::Connecting => "Connecting...",
            ConnectionPhase::Connected => "Disconnect Wallet",
            ConnectionPhase::Disconnecting | ConnectionPhase::Idle => "Connect Wallet",
        }
    }

    /// Name of the supported chain the session is on, if any.
    pub fn active_chain(&self) -> Option<&'static str> {
        match self.provider_kind {
            ProviderKind::Phantom => Some("Solana"),
            ProviderKind::NoneConnected => None,
            ProviderKind::MetaMask | ProviderKind::WalletConnect => match self.network_id? {
                ETHEREUM_MAINNET => Some("Ethereum"),
                POLYGON_MAINNET => Some("Polygon"),
                OPTIMISM_MAINNET => Some("Optimism"),
                _ => None,
            },
        }
    }

    fn clear_attachment(&mut self) {
        self.provider_kind = ProviderKind::NoneConnected;
        self.account_address = None;
        self.network_id = None;
        self.connected_at = None;
    }

    fn begin_connect(&mut self) {
        self.clear_attachment();
        self.connection_phase = ConnectionPhase::Connecting;
        self.epoch += 1;
    }

    fn establish(&mut self, kind: ProviderKind, handshake: Handshake) {
        self.provider_kind = kind;
        self.account_address = Some(handshake.account);
        self.network_id = handshake.network_id;
        self.connection_phase = ConnectionPhase::Connected;
        self.last_error = None;
        self.connected_at = Some(Utc::now());
    }

    fn fail(&mut self, err: &SessionError) {
        self.clear_attachment();
        self.connection_phase = ConnectionPhase::Idle;
        self.last_error = Some(err.to_string());
    }

    fn begin_disconnect(&mut self) {
        self.clear_attachment();
        self.connection_phase = ConnectionPhase::Disconnecting;
        self.last_error = None;
        self.epoch += 1;
    }

    fn settle_idle(&mut self) {
        self.clear_attachment();
        self.connection_phase = ConnectionPhase::Idle;
    }
}
