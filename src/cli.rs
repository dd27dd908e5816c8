use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::session::ProviderKind;

/// Wallet session CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "wallet-session", about = "External wallet session manager", version)]
pub struct Cli {
    /// Config file (overrides WALLET_SESSION_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Restore any already-authorized session and print it
    Status,
    /// Connect a wallet and print the resulting session
    Connect {
        /// metamask, walletconnect or phantom
        #[arg(long, value_parser = parse_provider)]
        provider: ProviderKind,
        /// Switch to this chain id after connecting
        #[arg(long = "switch-to")]
        switch_to: Option<u64>,
    },
    /// List the chains the manager can register with a provider
    Networks,
}

fn parse_provider(raw: &str) -> Result<ProviderKind, String> {
    raw.parse::<ProviderKind>().map_err(|e| e.to_string())
}
