pub mod ethereum;
pub mod networks;
pub mod phantom;
pub mod relay;
pub mod traits;

pub use ethereum::{EthersInjected, InjectedProvider, InjectedWallet, ProviderRpcError};
pub use networks::{NetworkParams, NetworkRegistry, TargetNetwork};
pub use phantom::PhantomWallet;
pub use relay::RelayWallet;
pub use traits::{Handshake, ProviderEvent, WalletProvider};
