//! EIP-1193 style injected provider support.
//!
//! [`InjectedProvider`] is the request/event surface an injected wallet
//! exposes. [`InjectedWallet`] drives the session handshakes over it, and
//! [`EthersInjected`] adapts any ethers JSON-RPC transport to it.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Provider, ProviderError, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{
    networks::{chain_id_from_value, to_hex_chain_id, NetworkParams},
    traits::{Handshake, ProviderEvent, WalletProvider},
};
use crate::{core::errors::SessionError, session::ProviderKind};

/// Capacity of the push-event channel of [`EthersInjected`].
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Error object returned by an EIP-1193 `request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
}

impl ProviderRpcError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const INTERNAL: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Request/event surface of an injected EVM wallet.
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;

    /// A fresh receiver for `accountsChanged` / `chainChanged` / `disconnect`.
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// MetaMask-like wallet session driver over an [`InjectedProvider`].
pub struct InjectedWallet<I: InjectedProvider> {
    provider: Arc<I>,
}

impl<I: InjectedProvider> InjectedWallet<I> {
    pub fn new(provider: Arc<I>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<I> {
        &self.provider
    }

    async fn accounts(&self, method: &str) -> Result<Vec<String>, SessionError> {
        debug!(method, "requesting accounts");
        let value = self.provider.request(method, json!([])).await?;
        serde_json::from_value(value).map_err(|e| {
            SessionError::TransientFailure(format!("Malformed {} response: {}", method, e))
        })
    }

    async fn chain_id(&self) -> Result<u64, SessionError> {
        let value = self.provider.request("eth_chainId", json!([])).await?;
        chain_id_from_value(&value)
    }

    async fn request_switch(&self, chain_id: u64) -> Result<(), ProviderRpcError> {
        self.provider
            .request("wallet_switchEthereumChain", json!([{ "chainId": to_hex_chain_id(chain_id) }]))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl<I> WalletProvider for InjectedWallet<I>
where
    I: InjectedProvider + 'static,
{
    fn kind(&self) -> ProviderKind {
        ProviderKind::MetaMask
    }

    async fn connect(&self) -> Result<Handshake, SessionError> {
        let accounts = self.accounts("eth_requestAccounts").await?;
        let account = accounts.into_iter().next().ok_or_else(|| {
            SessionError::TransientFailure("Provider returned no accounts".to_string())
        })?;
        let chain_id = self.chain_id().await?;

        info!(account = %account, chain_id, "Injected provider authorized");
        Ok(Handshake { account, network_id: Some(chain_id) })
    }

    async fn restore(&self) -> Result<Option<Handshake>, SessionError> {
        let accounts = self.accounts("eth_accounts").await?;
        let Some(account) = accounts.into_iter().next() else {
            debug!("No previously authorized accounts");
            return Ok(None);
        };
        let chain_id = self.chain_id().await?;
        Ok(Some(Handshake { account, network_id: Some(chain_id) }))
    }

    async fn switch_network(
        &self,
        chain_id: u64,
        params: Option<&NetworkParams>,
    ) -> Result<u64, SessionError> {
        match self.request_switch(chain_id).await {
            Ok(()) => Ok(chain_id),
            Err(err) if err.code == ProviderRpcError::UNRECOGNIZED_CHAIN => {
                let Some(params) = params else {
                    warn!(chain_id, "Chain unknown to provider and no parameters to register it");
                    return Err(err.into());
                };
                info!(chain_id, chain_name = %params.chain_name, "Registering chain with provider");
                self.provider.request("wallet_addEthereumChain", json!([params])).await?;
                // One retry only; whatever this returns is final.
                self.request_switch(chain_id).await?;
                Ok(chain_id)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        Some(self.provider.events())
    }
}

/// [`InjectedProvider`] backed by an ethers JSON-RPC transport.
///
/// Plain JSON-RPC has no push channel, so the host forwards wallet events
/// through [`EthersInjected::emit`].
pub struct EthersInjected<P: JsonRpcClient = Http> {
    provider: Provider<P>,
    events: broadcast::Sender<ProviderEvent>,
}

impl EthersInjected<Http> {
    pub fn connect(rpc_url: &str, timeout: Duration) -> Result<Self, SessionError> {
        let rpc_url_clean = rpc_url.trim();
        let parsed_url = reqwest::Url::parse(rpc_url_clean).map_err(|e| {
            SessionError::ProviderUnavailable(format!(
                "Invalid injected provider URL '{}': {}",
                rpc_url_clean, e
            ))
        })?;

        info!("Attaching injected provider at {}", parsed_url);
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Ok(proxy) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("HTTP_PROXY")) {
            if let Ok(p) = reqwest::Proxy::all(proxy) {
                builder = builder.proxy(p);
            }
        }
        let client = builder.build().map_err(|e| {
            SessionError::ProviderUnavailable(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self::new(Provider::new(Http::new_with_client(parsed_url, client))))
    }
}

impl<P: JsonRpcClient> EthersInjected<P> {
    pub fn new(provider: Provider<P>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { provider, events }
    }

    /// Forwards a wallet push event to current subscribers; returns how many
    /// received it.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }
}

fn rpc_error_from_provider(err: ProviderError) -> ProviderRpcError {
    match err.as_error_response() {
        Some(resp) => ProviderRpcError::new(resp.code, resp.message.clone()),
        None => ProviderRpcError::new(ProviderRpcError::INTERNAL, err.to_string()),
    }
}

#[async_trait]
impl<P> InjectedProvider for EthersInjected<P>
where
    P: JsonRpcClient + 'static,
{
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        debug!(method, "injected provider request");
        self.provider.request::<Value, Value>(method, params).await.map_err(rpc_error_from_provider)
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
