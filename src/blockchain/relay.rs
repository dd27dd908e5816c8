//! Remote-relay (WalletConnect-like) provider.
//!
//! There is no relay server behind this: the handshake is simulated with a
//! fixed delay and yields a synthetic account on a fixed EVM chain.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::traits::{Handshake, WalletProvider};
use crate::{
    core::{config::SimulatedProviderConfig, errors::SessionError},
    session::ProviderKind,
};

#[derive(Debug, Clone)]
pub struct RelayWallet {
    handshake_delay: Duration,
    account: String,
    chain_id: u64,
}

impl RelayWallet {
    pub fn new(handshake_delay: Duration, account: &str, chain_id: u64) -> Self {
        Self { handshake_delay, account: account.to_string(), chain_id }
    }

    pub fn from_config(config: &SimulatedProviderConfig) -> Self {
        Self::new(config.handshake_delay(), &config.relay_account, config.relay_chain_id)
    }
}

impl Default for RelayWallet {
    fn default() -> Self {
        Self::from_config(&SimulatedProviderConfig::default())
    }
}

#[async_trait]
impl WalletProvider for RelayWallet {
    fn kind(&self) -> ProviderKind {
        ProviderKind::WalletConnect
    }

    async fn connect(&self) -> Result<Handshake, SessionError> {
        info!(delay = ?self.handshake_delay, "[SIMULATED] Relay pairing");
        tokio::time::sleep(self.handshake_delay).await;
        Ok(Handshake { account: self.account.clone(), network_id: Some(self.chain_id) })
    }
}
