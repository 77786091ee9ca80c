//! Polling transaction subscription for one mint.
//!
//! Each poll walks `getSignaturesForAddress` newest-first from the head back to
//! the cursor (the newest signature already handled), then fetches and emits the
//! new transactions oldest-first. The handler runs on the subscription task, one
//! transaction at a time.

use {
    crate::{
        config::SubscriptionConfig,
        error::{Result, TokenwiseError},
        ledger::{
            backoff::ExponentialBackoff, normalizer::normalize_transaction, rpc_types::SignatureInfo,
            venue_scanner::VenueScanner, LedgerClient,
        },
        types::Transaction,
    },
    async_trait::async_trait,
    solana_pubkey::Pubkey,
    std::{
        collections::{HashMap, HashSet, VecDeque},
        ops::ControlFlow,
        sync::Arc,
    },
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
        time::sleep,
    },
};

/// Receives every newly observed transaction of the mint.
///
/// Returning `ControlFlow::Break` ends the subscription.
#[async_trait]
pub trait TransactionHandler: Send {
    async fn on_transaction(&mut self, tx: Transaction) -> ControlFlow<()>;
}

#[async_trait]
impl TransactionHandler for mpsc::Sender<Transaction> {
    async fn on_transaction(&mut self, tx: Transaction) -> ControlFlow<()> {
        match self.send(tx).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }
}

/// Bounded set of recently handled signatures, evicting the oldest
pub struct RecentSignatures {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentSignatures {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }

    /// Returns `false` if the signature was already present.
    pub fn insert(&mut self, signature: &str) -> bool {
        if self.seen.contains(signature) {
            return false;
        }

        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }

        self.seen.insert(signature.to_string());
        self.order.push_back(signature.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub polls: u64,
    pub transactions_emitted: u64,
    pub duplicates_skipped: u64,
    pub failed_skipped: u64,
    pub irrelevant_skipped: u64,
    /// Listed signatures the node never served within the retry limit
    pub unavailable_skipped: u64,
    pub errors: u64,
}

enum PollOutcome {
    Continue,
    Stopped,
    HandlerClosed,
}

/// Handle to a running subscription task.
///
/// Dropping the handle also stops the task at its next check.
pub struct TransactionSubscription {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<SubscriptionStats>>,
}

impl TransactionSubscription {
    /// Signals the task to stop without waiting. The in-flight handler call
    /// completes; no further calls are made.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn stop(self) -> Result<SubscriptionStats> {
        self.request_stop();
        self.join().await
    }

    /// Waits for the task to end. Surfaces the fatal error if it terminated on its own.
    pub async fn join(self) -> Result<SubscriptionStats> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(TokenwiseError::Network(format!("subscription task aborted: {}", e))),
        }
    }

}

/// Starts polling `mint` and invoking `handler` once per new transaction.
///
/// Must be called from within a tokio runtime.
pub fn subscribe_transactions<H>(
    ledger: Arc<dyn LedgerClient>,
    mint: Pubkey,
    config: SubscriptionConfig,
    handler: H,
) -> TransactionSubscription
where
    H: TransactionHandler + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);

    let poller = SignaturePoller {
        ledger,
        mint,
        recent: RecentSignatures::new(config.dedup_capacity),
        scanner: VenueScanner::new(),
        config,
        cursor: None,
        primed: false,
        unavailable: HashMap::new(),
        stats: SubscriptionStats::default(),
    };

    log::info!(
        "🔗 Subscribing to {} (poll every {:?}, page size {}, backfill {})",
        mint,
        poller.config.poll_interval,
        poller.config.page_size,
        poller.config.backfill
    );

    let handle = tokio::spawn(poller.run(handler, stop_rx));

    TransactionSubscription { stop_tx, handle }
}

struct SignaturePoller {
    ledger: Arc<dyn LedgerClient>,
    mint: Pubkey,
    config: SubscriptionConfig,
    scanner: VenueScanner,
    /// Newest signature already handled; next poll stops there
    cursor: Option<String>,
    primed: bool,
    /// Polls on which a listed signature came back empty from `getTransaction`
    unavailable: HashMap<String, u32>,
    recent: RecentSignatures,
    stats: SubscriptionStats,
}

impl SignaturePoller {
    async fn run<H: TransactionHandler>(
        mut self,
        mut handler: H,
        mut stop_rx: watch::Receiver<bool>,
    ) -> Result<SubscriptionStats> {
        let mut backoff = ExponentialBackoff::new(self.config.backoff);

        loop {
            if *stop_rx.borrow() {
                break;
            }

            match self.poll_once(&mut handler, &stop_rx).await {
                Ok(PollOutcome::Continue) => backoff.reset(),
                Ok(PollOutcome::Stopped) => break,
                Ok(PollOutcome::HandlerClosed) => {
                    log::info!("Transaction handler closed, ending subscription");
                    break;
                }
                Err(e) => {
                    self.stats.errors += 1;
                    log::warn!("⚠️  Poll failed for {}: {}", self.mint, e);

                    let delay = match backoff.next_delay() {
                        Some(delay) => delay,
                        None => {
                            log::error!("❌ Subscription for {} giving up: {}", self.mint, e);
                            return Err(e);
                        }
                    };

                    tokio::select! {
                        _ = sleep(delay) => continue,
                        _ = stop_rx.changed() => break,
                    }
                }
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                _ = stop_rx.changed() => break,
            }
        }

        log::info!(
            "✅ Subscription stopped: {} polls, {} emitted, {} duplicates, {} failed, {} irrelevant, {} unavailable, {} errors",
            self.stats.polls,
            self.stats.transactions_emitted,
            self.stats.duplicates_skipped,
            self.stats.failed_skipped,
            self.stats.irrelevant_skipped,
            self.stats.unavailable_skipped,
            self.stats.errors
        );

        Ok(self.stats)
    }

    async fn poll_once<H: TransactionHandler>(
        &mut self,
        handler: &mut H,
        stop_rx: &watch::Receiver<bool>,
    ) -> Result<PollOutcome> {
        self.stats.polls += 1;

        let pending = if self.primed {
            self.collect_new_signatures().await?
        } else {
            self.prime().await?
        };

        if !pending.is_empty() {
            log::debug!("📥 {} new signatures for {}", pending.len(), self.mint);
        }

        for info in pending {
            if *stop_rx.borrow() {
                return Ok(PollOutcome::Stopped);
            }

            let signature = info.signature;

            if self.recent.contains(&signature) {
                self.stats.duplicates_skipped += 1;
                self.cursor = Some(signature);
                continue;
            }

            if info.err.is_some() {
                self.stats.failed_skipped += 1;
                self.mark_handled(signature);
                continue;
            }

            let encoded = match self.ledger.fetch_transaction(&signature).await {
                Ok(Some(encoded)) => {
                    self.unavailable.remove(&signature);
                    encoded
                }
                Ok(None) => {
                    let attempts = self.unavailable.entry(signature.clone()).or_insert(0);
                    *attempts += 1;

                    if *attempts < self.config.max_unavailable_polls {
                        // Listed but not yet served; retried from here on the next poll
                        log::debug!("Transaction {} not available yet (attempt {})", signature, attempts);
                        return Ok(PollOutcome::Continue);
                    }

                    log::warn!(
                        "⚠️  Transaction {} still unavailable after {} polls, skipping",
                        signature,
                        attempts
                    );
                    self.unavailable.remove(&signature);
                    self.stats.unavailable_skipped += 1;
                    self.mark_handled(signature);
                    continue;
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    log::warn!("⚠️  Skipping {}: {}", signature, e);
                    self.stats.errors += 1;
                    self.mark_handled(signature);
                    continue;
                }
            };

            match normalize_transaction(&encoded, &self.mint, &self.scanner) {
                Ok(Some(tx)) => {
                    self.mark_handled(signature);
                    self.stats.transactions_emitted += 1;
                    if handler.on_transaction(tx).await.is_break() {
                        return Ok(PollOutcome::HandlerClosed);
                    }
                }
                Ok(None) => {
                    self.stats.irrelevant_skipped += 1;
                    self.mark_handled(signature);
                }
                Err(e) => {
                    log::warn!("⚠️  Could not normalize {}: {}", signature, e);
                    self.stats.errors += 1;
                    self.mark_handled(signature);
                }
            }
        }

        Ok(PollOutcome::Continue)
    }

    fn mark_handled(&mut self, signature: String) {
        self.recent.insert(&signature);
        self.cursor = Some(signature);
    }

    /// First poll: places the cursor at the head of history, or just below the
    /// `backfill` newest signatures, which are returned oldest-first.
    async fn prime(&mut self) -> Result<Vec<SignatureInfo>> {
        let limit = (self.config.backfill + 1).min(1000);
        let page = self
            .ledger
            .signatures_for_address(&self.mint, None, None, limit)
            .await?;

        let take = self.config.backfill.min(limit - 1).min(page.len());
        self.cursor = page.get(take).map(|info| info.signature.clone());
        self.primed = true;

        match &self.cursor {
            Some(cursor) => {
                self.recent.insert(cursor);
                log::info!("📍 Subscription cursor primed at {}", cursor);
            }
            None => log::info!("📍 No prior history for {}, emitting everything", self.mint),
        }

        let mut backfill: Vec<SignatureInfo> = page.into_iter().take(take).collect();
        backfill.reverse();
        Ok(backfill)
    }

    /// Signatures newer than the cursor, oldest-first.
    async fn collect_new_signatures(&self) -> Result<Vec<SignatureInfo>> {
        let page_size = self.config.page_size;
        let mut collected: Vec<SignatureInfo> = Vec::new();
        let mut before: Option<String> = None;

        for page_number in 1..=self.config.max_pages_per_poll {
            let page = self
                .ledger
                .signatures_for_address(&self.mint, before.as_deref(), self.cursor.as_deref(), page_size)
                .await?;

            let short = page.len() < page_size;
            before = page.last().map(|info| info.signature.clone());
            collected.extend(page);

            if short || before.is_none() {
                break;
            }

            if page_number == self.config.max_pages_per_poll {
                log::warn!(
                    "⚠️  Reached {} pages without meeting the cursor, older signatures may be skipped",
                    page_number
                );
            }
        }

        collected.reverse();
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_signatures_dedup_and_evict() {
        let mut recent = RecentSignatures::new(2);

        assert!(recent.insert("a"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(recent.insert("c"));

        assert_eq!(recent.len(), 2);
        assert!(!recent.contains("a"));
        assert!(recent.contains("b"));
        assert!(recent.contains("c"));
    }

    #[test]
    fn test_recent_signatures_zero_capacity_clamped() {
        let mut recent = RecentSignatures::new(0);
        assert!(recent.is_empty());
        assert!(recent.insert("a"));
        assert!(recent.insert("b"));
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_sender_handler_breaks_when_receiver_dropped() {
        use chrono::Utc;

        let (mut tx, rx) = mpsc::channel::<Transaction>(1);
        drop(rx);

        let flow = tx
            .on_transaction(Transaction {
                signature: "sig".to_string(),
                timestamp: Utc::now(),
                wallet: "wallet".to_string(),
                amount: 1.0,
                is_buy: true,
                protocol: "Unknown".to_string(),
            })
            .await;

        assert!(flow.is_break());
    }
}
