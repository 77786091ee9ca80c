//! Tokenwise ingestion process
//!
//! Snapshots the top holders of `TOKEN_MINT` and records its transactions into
//! SQLite until CTRL+C.

use {
    std::sync::Arc,
    tokenwise::{
        config::RuntimeConfig,
        ingestion::{IngestionConfig, IngestionLoop},
        ledger::{LedgerClient, RpcLedgerClient},
        store::{SqliteStore, Store},
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = RuntimeConfig::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("🚀 Starting Tokenwise");
    log::info!("   Mint: {}", config.token_mint);
    log::info!("   RPC URL: {}", config.rpc_url);
    log::info!("   Commitment: {:?}", config.commitment_level);
    log::info!("   Database: {}", config.db_path);
    log::info!("   Holder limit: {}", config.holder_limit);
    match config.snapshot_interval {
        Some(interval) => log::info!("   Snapshot interval: {:?}", interval),
        None => log::info!("   Snapshot interval: disabled (startup only)"),
    }
    log::info!("   Poll interval: {:?}", config.subscription.poll_interval);

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.db_path)?);
    let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::new(
        config.rpc_url.clone(),
        config.token_mint,
        config.commitment_level,
        config.rpc_timeout,
    )?);

    let ingestion = IngestionLoop::new(ledger, store, IngestionConfig::from_runtime(&config));

    log::info!("🔄 Press CTRL+C to shutdown gracefully");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("⚠️  Received CTRL+C, shutting down..."),
            Err(err) => {
                log::error!("❌ Failed to listen for CTRL+C: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    let stats = ingestion.run(shutdown).await?;

    log::info!(
        "✅ Tokenwise stopped: {} snapshots, {} transactions stored, {} duplicates",
        stats.snapshots,
        stats.transactions_stored,
        stats.duplicates
    );
    Ok(())
}
