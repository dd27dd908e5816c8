//! Non-EVM (Phantom-like) provider.
//!
//! Simulated handshake. The network id it reports is a marker, not an EVM
//! chain id, and carries no switch semantics.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::traits::{Handshake, WalletProvider};
use crate::{
    core::{config::SimulatedProviderConfig, errors::SessionError},
    session::ProviderKind,
};

/// Network marker reported for non-EVM sessions.
pub const NON_EVM_NETWORK_MARKER: u64 = 0;

#[derive(Debug, Clone)]
pub struct PhantomWallet {
    handshake_delay: Duration,
    account: String,
}

impl PhantomWallet {
    pub fn new(handshake_delay: Duration, account: &str) -> Self {
        Self { handshake_delay, account: account.to_string() }
    }

    pub fn from_config(config: &SimulatedProviderConfig) -> Self {
        Self::new(config.handshake_delay(), &config.phantom_account)
    }
}

impl Default for PhantomWallet {
    fn default() -> Self {
        Self::from_config(&SimulatedProviderConfig::default())
    }
}

#[async_trait]
impl WalletProvider for PhantomWallet {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Phantom
    }

    async fn connect(&self) -> Result<Handshake, SessionError> {
        info!(delay = ?self.handshake_delay, "[SIMULATED] Phantom connect");
        tokio::time::sleep(self.handshake_delay).await;
        Ok(Handshake { account: self.account.clone(), network_id: Some(NON_EVM_NETWORK_MARKER) })
    }
}
