// src/lib.rs
//! Provider-agnostic wallet session management.
//!
//! A [`SessionManager`] owns the one process-wide [`Session`]: which external
//! wallet is attached, its account, its chain, and where the connection is in
//! its lifecycle. Providers plug in through [`WalletProvider`].

pub mod blockchain;
pub mod cli;
pub mod core;
pub mod session;

pub use crate::blockchain::traits::{Handshake, ProviderEvent, WalletProvider};
pub use crate::core::{config::SessionConfig, errors::SessionError};
pub use crate::session::{ConnectionPhase, ProviderKind, Session, SessionManager};
