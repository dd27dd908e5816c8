// tests/util.rs
// Shared fakes for integration tests

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch, Notify};
use wallet_session::blockchain::ethereum::{InjectedProvider, InjectedWallet, ProviderRpcError};
use wallet_session::blockchain::networks::NetworkParams;
use wallet_session::session::SessionCache;
use wallet_session::{
    ConnectionPhase, Handshake, ProviderEvent, ProviderKind, Session, SessionError,
    WalletProvider,
};

pub const ACCOUNT_A: &str = "0xAAA0000000000000000000000000000000000111";
pub const ACCOUNT_B: &str = "0xBBB0000000000000000000000000000000000222";

type Reply = Result<Value, ProviderRpcError>;

/// Injected provider answering from per-method scripts.
///
/// One-shot replies are consumed in order; once a method's queue is empty its
/// standing reply (if any) is used, otherwise the method is unsupported.
pub struct ScriptedInjected {
    once: Mutex<HashMap<String, VecDeque<Reply>>>,
    always: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Value)>>,
    during: Mutex<HashMap<String, ProviderEvent>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl ScriptedInjected {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            once: Mutex::new(HashMap::new()),
            always: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            during: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Wallet with `accounts` authorized on `chain_id`; switches succeed.
    pub fn wallet_on(accounts: &[&str], chain_id: u64) -> Arc<Self> {
        let injected = Self::new();
        injected.always("eth_accounts", Ok(json!(accounts)));
        injected.always("eth_requestAccounts", Ok(json!(accounts)));
        injected.always("eth_chainId", Ok(json!(format!("{:#x}", chain_id))));
        injected.always("wallet_switchEthereumChain", Ok(Value::Null));
        injected.always("wallet_addEthereumChain", Ok(Value::Null));
        injected
    }

    pub fn once(&self, method: &str, reply: Reply) {
        self.once.lock().entry(method.to_string()).or_default().push_back(reply);
    }

    pub fn always(&self, method: &str, reply: Reply) {
        self.always.lock().insert(method.to_string(), reply);
    }

    /// Emits `event` once, while answering the next `method` request.
    pub fn emit_during(&self, method: &str, event: ProviderEvent) {
        self.during.lock().insert(method.to_string(), event);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }
}

#[async_trait]
impl InjectedProvider for ScriptedInjected {
    async fn request(&self, method: &str, params: Value) -> Reply {
        self.calls.lock().push((method.to_string(), params));
        let pending = self.during.lock().remove(method);
        if let Some(event) = pending {
            let _ = self.events.send(event);
        }
        if let Some(reply) = self.once.lock().get_mut(method).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.always.lock().get(method).cloned().unwrap_or_else(|| {
            Err(ProviderRpcError::new(ProviderRpcError::UNSUPPORTED_METHOD, method))
        })
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

pub fn metamask(injected: &Arc<ScriptedInjected>) -> Arc<InjectedWallet<ScriptedInjected>> {
    Arc::new(InjectedWallet::new(injected.clone()))
}

/// Provider whose handshake and network switch block until released.
pub struct GatedProvider {
    kind: ProviderKind,
    gate: Arc<Notify>,
    handshake: Handshake,
}

impl GatedProvider {
    pub fn new(kind: ProviderKind, account: &str, network_id: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            gate: Arc::new(Notify::new()),
            handshake: Handshake { account: account.to_string(), network_id },
        })
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl WalletProvider for GatedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn connect(&self) -> Result<Handshake, SessionError> {
        self.gate.notified().await;
        Ok(self.handshake.clone())
    }

    async fn switch_network(
        &self,
        chain_id: u64,
        _params: Option<&NetworkParams>,
    ) -> Result<u64, SessionError> {
        self.gate.notified().await;
        Ok(chain_id)
    }
}

/// Cache that counts resets.
#[derive(Default)]
pub struct CountingCache {
    resets: AtomicUsize,
}

impl CountingCache {
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl SessionCache for CountingCache {
    fn name(&self) -> &str {
        "counting"
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Waits (bounded) until a published session satisfies `predicate`.
pub async fn wait_until(
    rx: &mut watch::Receiver<Session>,
    predicate: impl FnMut(&Session) -> bool,
) -> Session {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session update")
        .expect("session publisher dropped")
        .clone()
}

pub async fn wait_for_phase(rx: &mut watch::Receiver<Session>, phase: ConnectionPhase) -> Session {
    wait_until(rx, |s| s.connection_phase() == phase).await
}

/// Lets spawned listener tasks drain pending events.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
