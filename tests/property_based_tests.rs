//! Property-based tests
//!
//! Random operation sequences against the session manager; the session
//! invariants must hold after every step.

mod util;

use std::{sync::Arc, time::Duration};

use proptest::prelude::*;
use serde_json::json;
use util::*;
use wallet_session::blockchain::{
    ethereum::ProviderRpcError, phantom::PhantomWallet, relay::RelayWallet,
};
use wallet_session::{ConnectionPhase, ProviderEvent, ProviderKind, SessionManager};

#[derive(Debug, Clone)]
enum Op {
    Initialize,
    Connect(ProviderKind),
    RejectNextConnect,
    Disconnect,
    Switch(u64),
    AccountsChanged(Vec<String>),
    ChainChanged(u64),
    ProviderDisconnected,
}

fn chain_id() -> impl Strategy<Value = u64> {
    prop_oneof![Just(1u64), Just(10), Just(137), Just(80001), Just(424242)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Initialize),
        prop_oneof![
            Just(ProviderKind::NoneConnected),
            Just(ProviderKind::MetaMask),
            Just(ProviderKind::WalletConnect),
            Just(ProviderKind::Phantom),
        ]
        .prop_map(Op::Connect),
        Just(Op::RejectNextConnect),
        Just(Op::Disconnect),
        chain_id().prop_map(Op::Switch),
        prop::collection::vec(prop_oneof![Just(ACCOUNT_A), Just(ACCOUNT_B)], 0..3).prop_map(
            |accounts| Op::AccountsChanged(accounts.into_iter().map(str::to_string).collect())
        ),
        chain_id().prop_map(Op::ChainChanged),
        Just(Op::ProviderDisconnected),
    ]
}

async fn apply(manager: &SessionManager, injected: &ScriptedInjected, op: Op) {
    match op {
        Op::Initialize => {
            manager.initialize().await;
        }
        Op::Connect(kind) => {
            let _ = manager.connect(kind).await;
        }
        Op::RejectNextConnect => injected.once(
            "eth_requestAccounts",
            Err(ProviderRpcError::new(ProviderRpcError::USER_REJECTED, "rejected")),
        ),
        Op::Disconnect => {
            let _ = manager.disconnect().await;
        }
        Op::Switch(chain_id) => {
            let _ = manager.switch_network(chain_id).await;
        }
        Op::AccountsChanged(accounts) => {
            injected.emit(ProviderEvent::AccountsChanged(accounts));
        }
        Op::ChainChanged(chain_id) => {
            injected.always("eth_chainId", Ok(json!(format!("{:#x}", chain_id))));
            injected.emit(ProviderEvent::ChainChanged(chain_id));
        }
        Op::ProviderDisconnected => {
            injected.emit(ProviderEvent::Disconnected("gone".to_string()));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn session_invariants_hold_for_any_operation_order(
        ops in prop::collection::vec(op(), 1..24)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async {
            let injected = ScriptedInjected::wallet_on(&[ACCOUNT_A], 1);
            let manager = SessionManager::builder()
                .provider(metamask(&injected))
                .provider(Arc::new(RelayWallet::new(Duration::ZERO, "0xWalletConnect...1234", 137)))
                .provider(Arc::new(PhantomWallet::new(Duration::ZERO, "Phantom...5678")))
                .build();

            let mut last_epoch = manager.snapshot().epoch();
            for op in ops {
                apply(&manager, &injected, op.clone()).await;
                // Let the event listener drain.
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                }

                let session = manager.snapshot();
                prop_assert!(session.invariants_hold(), "after {:?}: {:?}", op, session);
                prop_assert!(session.epoch() >= last_epoch, "epoch went backwards after {:?}", op);
                prop_assert!(
                    !matches!(
                        session.connection_phase(),
                        ConnectionPhase::Connecting | ConnectionPhase::Disconnecting
                    ),
                    "left in-flight after {:?}: {:?}",
                    op,
                    session
                );
                if session.provider_kind() != ProviderKind::MetaMask {
                    prop_assert!(!session.is_connected() || session.network_id().is_some());
                }
                last_epoch = session.epoch();
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
