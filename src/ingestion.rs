//! Ingestion loop: holder snapshots plus continuous transaction persistence.
//!
//! 1. Startup snapshot (retried with backoff on network errors)
//! 2. Subscription events forwarded over a bounded channel and persisted one at a time
//! 3. Periodic snapshot replacement on a fixed interval
//! 4. On shutdown: stop the subscription, drain queued events, return stats

use {
    crate::{
        config::{RuntimeConfig, SubscriptionConfig},
        error::Result,
        ledger::{
            backoff::{BackoffPolicy, ExponentialBackoff},
            subscribe_transactions, LedgerClient,
        },
        store::Store,
        types::Transaction,
    },
    std::{future::Future, sync::Arc, time::Duration},
    tokio::{
        sync::mpsc,
        time::{interval_at, sleep, Instant, Interval},
    },
};

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub holder_limit: usize,
    /// `None` disables periodic snapshots
    pub snapshot_interval: Option<Duration>,
    pub channel_buffer: usize,
    pub startup_backoff: BackoffPolicy,
    pub stats_log_interval: Duration,
    pub subscription: SubscriptionConfig,
}

impl IngestionConfig {
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            holder_limit: config.holder_limit,
            snapshot_interval: config.snapshot_interval,
            channel_buffer: config.channel_buffer,
            startup_backoff: config.subscription.backoff,
            stats_log_interval: Duration::from_secs(60),
            subscription: config.subscription.clone(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            holder_limit: 60,
            snapshot_interval: Some(Duration::from_secs(300)),
            channel_buffer: 1_000,
            startup_backoff: BackoffPolicy::default(),
            stats_log_interval: Duration::from_secs(60),
            subscription: SubscriptionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub snapshots: u64,
    pub snapshot_failures: u64,
    pub transactions_stored: u64,
    pub duplicates: u64,
    pub store_failures: u64,
}

pub struct IngestionLoop {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn Store>,
    config: IngestionConfig,
    stats: IngestionStats,
}

impl IngestionLoop {
    pub fn new(ledger: Arc<dyn LedgerClient>, store: Arc<dyn Store>, config: IngestionConfig) -> Self {
        Self {
            ledger,
            store,
            config,
            stats: IngestionStats::default(),
        }
    }

    pub fn stats(&self) -> &IngestionStats {
        &self.stats
    }

    /// One snapshot cycle: fetch the top holders and replace the stored set.
    ///
    /// On failure nothing is written and the prior snapshot remains.
    pub async fn snapshot_holders(&mut self) -> Result<usize> {
        let result = self.fetch_and_replace_holders().await;

        match &result {
            Ok(count) => {
                self.stats.snapshots += 1;
                log::info!("📸 Holder snapshot stored: {} holders", count);
            }
            Err(e) => {
                self.stats.snapshot_failures += 1;
                log::warn!("⚠️  Holder snapshot failed, keeping previous snapshot: {}", e);
            }
        }

        result
    }

    async fn fetch_and_replace_holders(&self) -> Result<usize> {
        let holders = self
            .ledger
            .snapshot_top_holders(self.config.holder_limit)
            .await?;
        self.store.replace_holder_snapshot(&holders).await?;
        Ok(holders.len())
    }

    async fn initial_snapshot(&mut self) -> Result<()> {
        let mut backoff = ExponentialBackoff::new(self.config.startup_backoff);

        loop {
            match self.snapshot_holders().await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_retryable() => match backoff.next_delay() {
                    Some(delay) => sleep(delay).await,
                    None => {
                        log::error!("❌ Startup snapshot failed after {} retries", backoff.attempts());
                        return Err(e);
                    }
                },
                Err(e) => {
                    log::error!("❌ Startup snapshot failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Persists one event. Failures are counted and logged, never propagated.
    pub async fn persist_transaction(&mut self, tx: Transaction) {
        match self.store.append_transaction(&tx).await {
            Ok(()) => {
                self.stats.transactions_stored += 1;
                log::info!(
                    "💾 {} {:.6} by {} via {} ({})",
                    if tx.is_buy { "BUY " } else { "SELL" },
                    tx.amount,
                    tx.wallet,
                    tx.protocol,
                    tx.signature
                );
            }
            Err(e) if e.is_duplicate() => {
                self.stats.duplicates += 1;
                log::debug!("Already stored: {}", tx.signature);
            }
            Err(e) => {
                self.stats.store_failures += 1;
                log::warn!("⚠️  Failed to persist {}: {}", tx.signature, e);
            }
        }
    }

    fn log_stats(&self) {
        log::info!(
            "📊 Snapshots: {} ({} failed) | Transactions: {} stored, {} duplicates, {} failed",
            self.stats.snapshots,
            self.stats.snapshot_failures,
            self.stats.transactions_stored,
            self.stats.duplicates,
            self.stats.store_failures
        );
    }

    /// Runs until `shutdown` resolves or the subscription ends on its own.
    ///
    /// Returns the fatal subscription error in the latter case.
    pub async fn run<F>(mut self, shutdown: F) -> Result<IngestionStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        log::info!(
            "🚀 Starting ingestion for {} ({} store, top {} holders)",
            self.ledger.token_mint(),
            self.store.backend_type(),
            self.config.holder_limit
        );

        tokio::select! {
            result = self.initial_snapshot() => result?,
            _ = &mut shutdown => {
                log::info!("🛑 Shutdown requested before startup completed");
                return Ok(self.stats);
            }
        }

        let (sender, mut rx) = mpsc::channel::<Transaction>(self.config.channel_buffer.max(1));
        let subscription = subscribe_transactions(
            Arc::clone(&self.ledger),
            *self.ledger.token_mint(),
            self.config.subscription.clone(),
            sender,
        );

        let mut snapshot_timer = self
            .config
            .snapshot_interval
            .map(|period| interval_at(Instant::now() + period, period));
        let stats_period = self.config.stats_log_interval;
        let mut stats_timer = interval_at(Instant::now() + stats_period, stats_period);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(tx) => self.persist_transaction(tx).await,
                    None => {
                        // Sender dropped: the subscription task has ended
                        self.log_stats();
                        return match subscription.join().await {
                            Ok(_) => {
                                log::warn!("Subscription ended without a shutdown request");
                                Ok(self.stats)
                            }
                            Err(e) => {
                                log::error!("❌ Subscription terminated: {}", e);
                                Err(e)
                            }
                        };
                    }
                },
                _ = next_tick(&mut snapshot_timer) => {
                    let _ = self.snapshot_holders().await;
                }
                _ = stats_timer.tick() => self.log_stats(),
                _ = &mut shutdown => {
                    log::info!("🛑 Shutdown requested, draining queued transactions");
                    break;
                }
            }
        }

        subscription.request_stop();

        let mut drained = 0usize;
        while let Some(tx) = rx.recv().await {
            self.persist_transaction(tx).await;
            drained += 1;
        }
        if drained > 0 {
            log::info!("Drained {} queued transactions", drained);
        }

        let result = subscription.join().await;
        self.log_stats();

        match result {
            Ok(_) => Ok(self.stats),
            Err(e) => {
                log::error!("❌ Subscription terminated: {}", e);
                Err(e)
            }
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_runtime() {
        let runtime = RuntimeConfig {
            token_mint: solana_pubkey::Pubkey::new_unique(),
            rpc_url: "http://localhost:8899".to_string(),
            commitment_level: crate::config::CommitmentLevel::Finalized,
            db_path: "tokenwise.db".to_string(),
            holder_limit: 25,
            snapshot_interval: None,
            rpc_timeout: Duration::from_secs(15),
            channel_buffer: 10,
            rust_log: "info".to_string(),
            subscription: SubscriptionConfig::default(),
        };

        let config = IngestionConfig::from_runtime(&runtime);
        assert_eq!(config.holder_limit, 25);
        assert_eq!(config.snapshot_interval, None);
        assert_eq!(config.channel_buffer, 10);
        assert_eq!(config.startup_backoff, BackoffPolicy::default());
    }

    #[tokio::test]
    async fn test_disabled_timer_never_ticks() {
        let mut timer: Option<Interval> = None;
        let ticked = tokio::time::timeout(Duration::from_millis(20), next_tick(&mut timer)).await;
        assert!(ticked.is_err());
    }
}
