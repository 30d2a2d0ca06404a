//! Horizon - ledger-chain indexer and history API
//!
//! # Usage
//! ```bash
//! horizon --config horizon.toml serve         # bootstrap if needed, then serve HTTP
//! horizon --config horizon.toml init          # write the genesis ledger
//! horizon --config horizon.toml close-ledger  # close one ledger over pending transactions
//! horizon --config horizon.toml audit         # verify the hash chain
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use horizon_api::{create_router, AppState, HorizonConfig};
use horizon_index::TransactionIndexer;
use horizon_store::{HistoryStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Horizon - ledger-chain indexer and history API
#[derive(Parser, Debug)]
#[command(name = "horizon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API, closing ledgers on the configured interval
    Serve,
    /// Write the genesis ledger and fund the root account
    Init,
    /// Close one ledger over all pending transactions
    CloseLedger,
    /// Verify sequence continuity and prev-hash links of the whole chain
    Audit,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = HorizonConfig::load(args.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    init_logging(args.log_level.as_deref().unwrap_or(&config.server.log_level));
    tracing::info!("Horizon v{}", env!("CARGO_PKG_VERSION"));

    let store = SqliteStore::connect(&config.database.url, &config.store_options())
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    let store: Arc<dyn HistoryStore> = Arc::new(store);
    let state = AppState::new(store, config.network_settings());

    match args.command {
        Command::Init => {
            let genesis = bootstrap(&state.indexer, &config).await?;
            tracing::info!(hash = %genesis.hash, "genesis ledger ready");
        }
        Command::CloseLedger => {
            let ledger = state.indexer.close_ledger().await?;
            tracing::info!(
                sequence = ledger.sequence,
                transactions = ledger.transaction_count,
                "ledger closed"
            );
        }
        Command::Audit => {
            let report = state.indexer.audit().await?;
            match report.latest {
                Some(latest) => tracing::info!(
                    ledgers = report.ledgers,
                    latest = latest.sequence,
                    hash = %latest.hash,
                    "chain is intact"
                ),
                None => tracing::info!("chain is empty"),
            }
        }
        Command::Serve => serve(state, &config).await?,
    }

    Ok(())
}

async fn bootstrap(
    indexer: &TransactionIndexer,
    config: &HorizonConfig,
) -> Result<horizon_core::Ledger> {
    let root = config.root_account()?;
    Ok(indexer.bootstrap(&root, config.network.total_coins).await?)
}

async fn serve(state: AppState, config: &HorizonConfig) -> Result<()> {
    bootstrap(&state.indexer, config).await?;

    if let Some(interval) = config.close_interval() {
        tokio::spawn(close_ledgers(state.indexer.clone(), interval));
    }

    let app = create_router(state, config.server.cors);
    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    tracing::info!("Horizon API listening at http://{}", config.server.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Horizon API stopped");
    Ok(())
}

/// Close a ledger every `period`; failures are logged and retried next tick
async fn close_ledgers(indexer: Arc<TransactionIndexer>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match indexer.close_ledger().await {
            Ok(ledger) => tracing::debug!(
                sequence = ledger.sequence,
                transactions = ledger.transaction_count,
                "scheduled close"
            ),
            Err(err) => tracing::warn!(error = %err, "scheduled close failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
