// src/main.rs
//! Wallet session CLI entry point.
//! Builds the session manager from config, restores any authorized session,
//! runs one command and prints the resulting session as JSON.
use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wallet_session::cli::{Cli, Commands};
use wallet_session::core::config::SessionConfig;
use wallet_session::{Session, SessionManager};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    info!("Starting wallet-session v{}", env!("CARGO_PKG_VERSION"));

    let config = match cli.config.as_deref() {
        Some(path) => {
            let mut config = SessionConfig::load(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => SessionConfig::from_env()?,
    };

    match cli.command {
        // The network table needs no providers
        Commands::Networks => {
            let networks: Vec<_> = config.network_registry().iter().cloned().collect();
            println!("{}", serde_json::to_string_pretty(&networks)?);
        }
        Commands::Status => {
            let manager = SessionManager::from_config(&config);
            let restored = manager.initialize().await;
            print_session(&manager, &restored)?;
        }
        Commands::Connect { provider, switch_to } => {
            let manager = SessionManager::from_config(&config);
            manager.initialize().await;
            let connected = manager.connect(provider).await;
            if connected.is_ok() {
                if let Some(chain_id) = switch_to {
                    if let Err(e) = manager.switch_network(chain_id).await {
                        warn!(chain_id, "Network switch failed: {}", e);
                    }
                }
            }
            print_session(&manager, &manager.snapshot())?;
            connected?;
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn print_session(manager: &SessionManager, session: &Session) -> Result<()> {
    let view = json!({
        "session": session,
        "short_address": session.short_address(),
        "status": session.status_label(),
        "active_chain": session.active_chain(),
        "on_target_network": manager.is_on_target_network(),
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
