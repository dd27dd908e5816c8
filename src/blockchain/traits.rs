use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    blockchain::networks::NetworkParams, core::errors::SessionError, session::ProviderKind,
};

/// Outcome of a successful provider handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Account identifier exactly as the provider reported it.
    pub account: String,
    /// Active chain id, or the provider's fixed network marker.
    pub network_id: Option<u64>,
}

/// Push notification emitted by a provider independently of any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    Disconnected(String),
}

/// Capability interface of an external account-bearing provider.
///
/// The session manager only talks to providers through this trait, so tests
/// substitute deterministic fakes for the injected provider and the simulated
/// handshakes alike.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Which provider kind this implementation backs.
    fn kind(&self) -> ProviderKind;

    /// Interactive handshake: may prompt the operator.
    async fn connect(&self) -> Result<Handshake, SessionError>;

    /// Silent handshake using already-authorized accounts. `Ok(None)` means
    /// nothing is authorized. Providers without the notion return `Ok(None)`.
    async fn restore(&self) -> Result<Option<Handshake>, SessionError> {
        Ok(None)
    }

    /// Switches the active chain, returning the chain id now in effect.
    /// `params` is used to register the chain if the provider does not know it.
    async fn switch_network(
        &self,
        chain_id: u64,
        params: Option<&NetworkParams>,
    ) -> Result<u64, SessionError> {
        let _ = params;
        Err(SessionError::InvalidState(format!(
            "{} cannot switch to chain {}",
            self.kind(),
            chain_id
        )))
    }

    /// Subscribes to push notifications. `None` if the provider has none.
    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }

    /// Releases provider-side resources held for the session.
    async fn disconnect(&self) {}
}
