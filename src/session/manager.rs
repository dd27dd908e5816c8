//! Wallet session manager.
//!
//! Single writer of the [`Session`]. Every transition happens under a short
//! `parking_lot` lock that is never held across an `.await`; the result is
//! published through a `watch` channel. `connection_phase` is the mutual
//! exclusion flag: mutations arriving while a handshake or teardown is in
//! flight are rejected, not queued.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{cache::CacheRegistry, ConnectionPhase, ProviderKind, Session, SessionCache};
use crate::{
    blockchain::{
        ethereum::{EthersInjected, InjectedWallet},
        networks::{NetworkRegistry, TargetNetwork},
        phantom::PhantomWallet,
        relay::RelayWallet,
        traits::{Handshake, ProviderEvent, WalletProvider},
    },
    core::{config::SessionConfig, errors::SessionError},
};

/// Cloneable handle to the process-wide session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    providers: HashMap<ProviderKind, Arc<dyn WalletProvider>>,
    target: TargetNetwork,
    networks: NetworkRegistry,
    state: Mutex<State>,
    publisher: watch::Sender<Session>,
    caches: CacheRegistry,
}

#[derive(Default)]
struct State {
    session: Session,
    switching: bool,
    listener: Option<CancellationToken>,
}

impl State {
    /// Connected under `epoch`; events from any other epoch are stale.
    fn is_current(&self, epoch: u64) -> bool {
        self.session.epoch == epoch && self.session.connection_phase == ConnectionPhase::Connected
    }

    fn cancel_listener(&mut self) {
        if let Some(token) = self.listener.take() {
            token.cancel();
        }
    }
}

#[derive(Default)]
pub struct SessionManagerBuilder {
    providers: HashMap<ProviderKind, Arc<dyn WalletProvider>>,
    target: TargetNetwork,
    networks: Option<NetworkRegistry>,
}

impl SessionManagerBuilder {
    /// Registers a provider under its own kind, replacing any previous one.
    pub fn provider(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn target(mut self, target: TargetNetwork) -> Self {
        self.target = target;
        self
    }

    pub fn networks(mut self, networks: NetworkRegistry) -> Self {
        self.networks = Some(networks);
        self
    }

    pub fn build(self) -> SessionManager {
        let (publisher, _) = watch::channel(Session::default());
        SessionManager {
            inner: Arc::new(Inner {
                providers: self.providers,
                target: self.target,
                networks: self.networks.unwrap_or_default(),
                state: Mutex::new(State::default()),
                publisher,
                caches: CacheRegistry::default(),
            }),
        }
    }
}

impl SessionManager {
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::default()
    }

    /// Builds a manager with the simulated providers and, when an endpoint is
    /// configured and reachable, the injected provider.
    pub fn from_config(config: &SessionConfig) -> Self {
        let mut builder = Self::builder()
            .provider(Arc::new(RelayWallet::from_config(&config.simulated)))
            .provider(Arc::new(PhantomWallet::from_config(&config.simulated)))
            .target(config.target)
            .networks(config.network_registry());

        if let Some(rpc_url) = config.injected.rpc_url.as_deref() {
            match EthersInjected::connect(rpc_url, config.injected.request_timeout()) {
                Ok(injected) => {
                    builder = builder.provider(Arc::new(InjectedWallet::new(Arc::new(injected))));
                }
                Err(e) => warn!("Injected provider unavailable: {}", e),
            }
        }
        builder.build()
    }

    /// Current published session.
    pub fn snapshot(&self) -> Session {
        self.inner.publisher.borrow().clone()
    }

    /// Receiver that observes every published session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.publisher.subscribe()
    }

    pub fn register_cache(&self, cache: Arc<dyn SessionCache>) {
        self.inner.caches.register(cache);
    }

    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        self.inner.providers.contains_key(&kind)
    }

    pub fn target(&self) -> TargetNetwork {
        self.inner.target
    }

    pub fn networks(&self) -> &NetworkRegistry {
        &self.inner.networks
    }

    /// Picks up an already-authorized account without prompting. Nothing
    /// authorized, or a provider error, leaves the session empty with no
    /// error recorded.
    pub async fn initialize(&self) -> Session {
        self.inner.initialize().await
    }

    pub async fn connect(&self, kind: ProviderKind) -> Result<Session, SessionError> {
        self.inner.connect(kind).await
    }

    /// Idempotent. Only rejected while a connect is in flight.
    pub async fn disconnect(&self) -> Result<Session, SessionError> {
        self.inner.disconnect(None).await
    }

    pub async fn switch_network(&self, chain_id: u64) -> Result<Session, SessionError> {
        self.inner.switch_network(chain_id).await
    }

    pub fn is_on_target_network(&self) -> bool {
        let state = self.inner.state.lock();
        let session = &state.session;
        session.provider_kind.is_evm()
            && session.network_id.map_or(false, |id| self.inner.target.accepts(id))
    }
}

/// Puts an abandoned `Connecting`/`Disconnecting` phase back to `Idle` when
/// the owning future is dropped before it settles.
struct PhaseGuard<'a> {
    inner: &'a Inner,
    epoch: u64,
    phase: ConnectionPhase,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn new(inner: &'a Inner, epoch: u64, phase: ConnectionPhase) -> Self {
        Self { inner, epoch, phase, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.inner.state.lock();
        if state.session.epoch == self.epoch && state.session.connection_phase == self.phase {
            warn!(phase = %self.phase, "Abandoned in-flight transition, returning to idle");
            state.session.settle_idle();
            self.inner.publish(&state);
        }
    }
}

struct SwitchGuard<'a> {
    inner: &'a Inner,
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.lock().switching = false;
    }
}

impl Inner {
    fn publish(&self, state: &State) {
        debug_assert!(state.session.invariants_hold());
        self.publisher.send_replace(state.session.clone());
    }

    fn provider_for(&self, kind: ProviderKind) -> Result<Arc<dyn WalletProvider>, SessionError> {
        match kind {
            ProviderKind::NoneConnected => {
                Err(SessionError::InvalidProvider("cannot connect to 'none'".to_string()))
            }
            ProviderKind::MetaMask | ProviderKind::WalletConnect | ProviderKind::Phantom => {
                self.providers.get(&kind).cloned().ok_or_else(|| {
                    SessionError::ProviderUnavailable(format!(
                        "{} is not available",
                        kind.display_name()
                    ))
                })
            }
        }
    }

    fn ensure_not_busy(state: &State, operation: &str) -> Result<(), SessionError> {
        match state.session.connection_phase {
            ConnectionPhase::Connecting | ConnectionPhase::Disconnecting => {
                Err(SessionError::Busy(format!(
                    "{} rejected while {}",
                    operation, state.session.connection_phase
                )))
            }
            ConnectionPhase::Idle | ConnectionPhase::Connected if state.switching => {
                Err(SessionError::Busy(format!("{} rejected during a network switch", operation)))
            }
            ConnectionPhase::Idle | ConnectionPhase::Connected => Ok(()),
        }
    }

    async fn initialize(self: &Arc<Self>) -> Session {
        for kind in ProviderKind::ALL {
            if !kind.supports_silent_restore() {
                continue;
            }
            let Some(provider) = self.providers.get(&kind).cloned() else {
                continue;
            };

            let epoch = {
                let mut state = self.state.lock();
                if state.session.connection_phase != ConnectionPhase::Idle || state.switching {
                    debug!("Session already in use, skipping restore");
                    return state.session.clone();
                }
                state.session.begin_connect();
                self.publish(&state);
                state.session.epoch
            };

            let events = provider.subscribe();
            let mut guard = PhaseGuard::new(self, epoch, ConnectionPhase::Connecting);
            let result = provider.restore().await;
            guard.disarm();

            let mut state = self.state.lock();
            if state.session.epoch != epoch {
                return state.session.clone();
            }
            match result {
                Ok(Some(handshake)) => {
                    self.establish(&mut state, kind, events, handshake);
                    info!(provider = %kind, "Restored previously authorized session");
                    return state.session.clone();
                }
                Ok(None) => state.session.settle_idle(),
                Err(e) => {
                    warn!(provider = %kind, "Error checking existing connection: {}", e);
                    state.session.settle_idle();
                }
            }
            self.publish(&state);
        }
        self.state.lock().session.clone()
    }

    async fn connect(self: &Arc<Self>, kind: ProviderKind) -> Result<Session, SessionError> {
        let (provider, epoch, torn_down) = {
            let mut state = self.state.lock();
            Self::ensure_not_busy(&state, "connect")?;

            let provider = match self.provider_for(kind) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!(provider = %kind, "Connect failed: {}", e);
                    state.session.last_error = Some(e.to_string());
                    self.publish(&state);
                    return Err(e);
                }
            };

            let torn_down = state.session.is_connected();
            if torn_down {
                info!(
                    previous = %state.session.provider_kind,
                    next = %kind,
                    "Tearing down previous session"
                );
            }
            state.cancel_listener();
            state.session.begin_connect();
            self.publish(&state);
            (provider, state.session.epoch, torn_down)
        };
        if torn_down {
            self.caches.reset_all("provider change");
        }

        info!(provider = %kind, "Connecting wallet");
        // Subscribe first so events raised mid-handshake are buffered.
        let events = provider.subscribe();
        let mut guard = PhaseGuard::new(self, epoch, ConnectionPhase::Connecting);
        let result = provider.connect().await;
        guard.disarm();

        let mut state = self.state.lock();
        if state.session.epoch != epoch
            || state.session.connection_phase != ConnectionPhase::Connecting
        {
            return Err(SessionError::Busy("session changed while connecting".to_string()));
        }
        match result {
            Ok(handshake) => {
                self.establish(&mut state, kind, events, handshake);
                info!(
                    provider = %kind,
                    account = state.session.account_address().unwrap_or_default(),
                    network_id = ?state.session.network_id,
                    "Wallet connected"
                );
                Ok(state.session.clone())
            }
            Err(e) => {
                warn!(provider = %kind, "Error connecting wallet: {}", e);
                state.session.fail(&e);
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// Records a successful handshake and starts listening on `events`, a
    /// receiver taken before the handshake began.
    fn establish(
        self: &Arc<Self>,
        state: &mut State,
        kind: ProviderKind,
        events: Option<broadcast::Receiver<ProviderEvent>>,
        handshake: Handshake,
    ) {
        state.session.establish(kind, handshake);
        state.cancel_listener();
        if let Some(events) = events {
            state.listener = Some(self.spawn_listener(events, state.session.epoch));
        }
        self.publish(state);
    }

    fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<ProviderEvent>,
        epoch: u64,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    received = events.recv() => received,
                };
                let Some(inner) = weak.upgrade() else { break };
                match received {
                    Ok(event) => inner.handle_event(epoch, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dropped provider events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(epoch, "Provider event stream closed");
                        break;
                    }
                }
            }
        });
        token
    }

    async fn handle_event(self: &Arc<Self>, epoch: u64, event: ProviderEvent) {
        debug!(epoch, ?event, "Provider event");
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.into_iter().next() {
                None => {
                    info!("Provider reported no accounts, disconnecting");
                    let _ = self.disconnect(Some(epoch)).await;
                }
                Some(account) => {
                    let changed = {
                        let mut state = self.state.lock();
                        if !state.is_current(epoch)
                            || state.session.account_address.as_deref() == Some(account.as_str())
                        {
                            false
                        } else {
                            info!(account = %account, "Account changed");
                            state.session.account_address = Some(account);
                            self.publish(&state);
                            true
                        }
                    };
                    if changed {
                        self.caches.reset_all("account changed");
                    }
                }
            },
            ProviderEvent::ChainChanged(chain_id) => self.reestablish(epoch, chain_id).await,
            ProviderEvent::Disconnected(reason) => {
                info!(reason = %reason, "Provider disconnected");
                let _ = self.disconnect(Some(epoch)).await;
            }
        }
    }

    /// Network changed under us: drop everything derived from the old chain
    /// and build the session again from the provider's current state.
    async fn reestablish(self: &Arc<Self>, epoch: u64, chain_id: u64) {
        let (kind, provider, events, new_epoch) = {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            let kind = state.session.provider_kind;
            let Some(provider) = self.providers.get(&kind).cloned() else {
                return;
            };
            let events = provider.subscribe();
            state.cancel_listener();
            state.session.begin_connect();
            self.publish(&state);
            (kind, provider, events, state.session.epoch)
        };
        self.caches.reset_all("network changed");
        info!(provider = %kind, chain_id, "Network changed, re-establishing session");

        let mut guard = PhaseGuard::new(self, new_epoch, ConnectionPhase::Connecting);
        let result = provider.restore().await;
        guard.disarm();

        let mut state = self.state.lock();
        if state.session.epoch != new_epoch
            || state.session.connection_phase != ConnectionPhase::Connecting
        {
            return;
        }
        match result {
            Ok(Some(handshake)) => self.establish(&mut state, kind, events, handshake),
            Ok(None) => {
                info!(provider = %kind, "No authorized accounts after network change");
                state.session.settle_idle();
                self.publish(&state);
            }
            Err(e) => {
                warn!(provider = %kind, "Failed to re-establish session: {}", e);
                state.session.fail(&e);
                self.publish(&state);
            }
        }
    }

    /// `expected_epoch` restricts the teardown to that session; used by
    /// provider events so a late event cannot end a newer session.
    async fn disconnect(
        self: &Arc<Self>,
        expected_epoch: Option<u64>,
    ) -> Result<Session, SessionError> {
        let (kind, epoch) = {
            let mut state = self.state.lock();
            if let Some(expected) = expected_epoch {
                if !state.is_current(expected) {
                    return Ok(state.session.clone());
                }
            }
            match state.session.connection_phase {
                ConnectionPhase::Connecting => {
                    return Err(SessionError::Busy("disconnect rejected while connecting".into()));
                }
                ConnectionPhase::Disconnecting => return Ok(state.session.clone()),
                ConnectionPhase::Idle => {
                    state.cancel_listener();
                    if state.session.last_error.take().is_some() {
                        self.publish(&state);
                    }
                    return Ok(state.session.clone());
                }
                ConnectionPhase::Connected => {}
            }
            let kind = state.session.provider_kind;
            state.cancel_listener();
            state.session.begin_disconnect();
            self.publish(&state);
            (kind, state.session.epoch)
        };
        self.caches.reset_all("disconnect");

        let mut guard = PhaseGuard::new(self, epoch, ConnectionPhase::Disconnecting);
        if let Some(provider) = self.providers.get(&kind) {
            provider.disconnect().await;
        }
        guard.disarm();

        let mut state = self.state.lock();
        if state.session.epoch == epoch
            && state.session.connection_phase == ConnectionPhase::Disconnecting
        {
            state.session.settle_idle();
            self.publish(&state);
        }
        info!(provider = %kind, "Wallet disconnected");
        Ok(state.session.clone())
    }

    async fn switch_network(self: &Arc<Self>, chain_id: u64) -> Result<Session, SessionError> {
        let (provider, epoch) = {
            let mut state = self.state.lock();
            Self::ensure_not_busy(&state, "switch network")?;
            if !state.session.is_connected() {
                return Err(SessionError::InvalidState(
                    "Wallet not connected; cannot switch network".to_string(),
                ));
            }
            let kind = state.session.provider_kind;
            if !kind.supports_network_switch() {
                return Err(SessionError::InvalidState(format!(
                    "{} does not support network switching",
                    kind.display_name()
                )));
            }
            let provider = self.provider_for(kind)?;
            state.switching = true;
            (provider, state.session.epoch)
        };

        let guard = SwitchGuard { inner: self.as_ref() };
        let params = self.networks.get(chain_id);
        if params.is_none() {
            debug!(chain_id, "No registration parameters for target chain");
        }
        info!(chain_id, "Switching network");
        let result = provider.switch_network(chain_id, params).await;
        drop(guard);

        let mut state = self.state.lock();
        if !state.is_current(epoch) {
            // Re-established or torn down meanwhile; that path owns the session now.
            return Err(result.err().unwrap_or_else(|| {
                SessionError::InvalidState("session changed during network switch".to_string())
            }));
        }
        match result {
            Ok(active) => {
                state.session.network_id = Some(active);
                state.session.last_error = None;
                self.publish(&state);
                info!(chain_id = active, "Network switched");
                Ok(state.session.clone())
            }
            Err(e) => {
                warn!(chain_id, "Error switching network: {}", e);
                state.session.last_error = Some(e.to_string());
                self.publish(&state);
                Err(e)
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state.get_mut().cancel_listener();
    }
}
