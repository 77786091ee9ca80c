//! Scripted in-memory ledger shared by the integration tests.

#![allow(dead_code)]

use {
    async_trait::async_trait,
    serde_json::{json, Value},
    solana_pubkey::Pubkey,
    solana_signature::Signature,
    std::{
        collections::{HashMap, HashSet, VecDeque},
        sync::Mutex,
        time::Duration,
    },
    tokenwise::{
        config::SubscriptionConfig,
        ledger::{backoff::BackoffPolicy, EncodedTransaction, LedgerClient, SignatureInfo},
        Result, TokenHolder, TokenwiseError,
    },
};

pub const JUPITER: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";

pub fn fast_backoff(max_retries: u32) -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_retries,
    }
}

pub fn fast_subscription(backfill: usize) -> SubscriptionConfig {
    SubscriptionConfig {
        poll_interval: Duration::from_millis(10),
        page_size: 100,
        max_pages_per_poll: 10,
        backfill,
        dedup_capacity: 1_000,
        max_unavailable_polls: 3,
        backoff: fast_backoff(3),
    }
}

/// What a scripted transaction does to the mint
#[derive(Debug, Clone, Copy)]
pub enum Activity {
    Buy(u64),
    Sell(u64),
    /// Failed on chain (`err` set)
    Failed,
    /// Succeeds without moving the mint
    Unrelated,
}

#[derive(Default)]
struct MockState {
    /// Newest first, as the node returns it
    history: Vec<SignatureInfo>,
    transactions: HashMap<String, EncodedTransaction>,
    holders: Vec<TokenHolder>,
    snapshot_failures: VecDeque<TokenwiseError>,
    listing_failures: usize,
    unavailable_once: HashSet<String>,
    never_served: HashSet<String>,
    ignore_until: bool,
    snapshot_calls: usize,
    listing_calls: usize,
    next_seed: u64,
    slot: u64,
}

pub struct MockLedger {
    mint: Pubkey,
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            mint: Pubkey::new_unique(),
            state: Mutex::new(MockState {
                slot: 1_000,
                ..MockState::default()
            }),
        }
    }

    pub fn mint(&self) -> Pubkey {
        self.mint
    }

    pub fn set_holders(&self, holders: Vec<TokenHolder>) {
        self.state.lock().unwrap().holders = holders;
    }

    pub fn fail_next_snapshot(&self, error: TokenwiseError) {
        self.state.lock().unwrap().snapshot_failures.push_back(error);
    }

    pub fn fail_listings(&self, count: usize) {
        self.state.lock().unwrap().listing_failures = count;
    }

    /// Return the whole history on every listing, as a misbehaving node would
    pub fn ignore_until(&self) {
        self.state.lock().unwrap().ignore_until = true;
    }

    /// First `getTransaction` for this signature returns nothing
    pub fn make_unavailable_once(&self, signature: &str) {
        self.state.lock().unwrap().unavailable_once.insert(signature.to_string());
    }

    /// `getTransaction` for this signature always returns nothing
    pub fn never_serve(&self, signature: &str) {
        self.state.lock().unwrap().never_served.insert(signature.to_string());
    }

    pub fn snapshot_calls(&self) -> usize {
        self.state.lock().unwrap().snapshot_calls
    }

    pub fn listing_calls(&self) -> usize {
        self.state.lock().unwrap().listing_calls
    }

    /// Appends a new transaction at the head of history; returns its signature.
    pub fn push(&self, wallet: &str, activity: Activity) -> String {
        let mut state = self.state.lock().unwrap();

        state.next_seed += 1;
        state.slot += 1;
        let mut bytes = [9u8; 64];
        bytes[..8].copy_from_slice(&state.next_seed.to_le_bytes());
        let signature = Signature::from(bytes).to_string();

        let block_time = 1_704_067_200 + state.next_seed as i64;
        let encoded = encoded_transaction(&signature, &self.mint.to_string(), wallet, activity, block_time);
        let err = match activity {
            Activity::Failed => Some(json!({ "InstructionError": [0, "Custom"] })),
            _ => None,
        };

        let info = SignatureInfo {
            signature: signature.clone(),
            slot: state.slot,
            err,
            block_time: Some(block_time),
        };
        state.history.insert(0, info);
        state.transactions.insert(signature.clone(), encoded);

        signature
    }
}

fn token_balance(index: u16, mint: &str, owner: &str, raw: u64) -> Value {
    let ui = raw as f64 / 1_000_000.0;
    json!({
        "accountIndex": index,
        "mint": mint,
        "owner": owner,
        "uiTokenAmount": {
            "amount": raw.to_string(),
            "decimals": 6,
            "uiAmount": ui,
            "uiAmountString": ui.to_string()
        }
    })
}

fn encoded_transaction(signature: &str, mint: &str, wallet: &str, activity: Activity, block_time: i64) -> EncodedTransaction {
    let pool = "7YttLkHDoNj9wyDur5pM1ejNaAvT9X4eqaYcHQqtj2G5";
    let (pre, post, err) = match activity {
        Activity::Buy(raw) => (
            vec![token_balance(1, mint, wallet, 0), token_balance(2, mint, pool, raw)],
            vec![token_balance(1, mint, wallet, raw), token_balance(2, mint, pool, 0)],
            Value::Null,
        ),
        Activity::Sell(raw) => (
            vec![token_balance(1, mint, wallet, raw), token_balance(2, mint, pool, 0)],
            vec![token_balance(1, mint, wallet, 0), token_balance(2, mint, pool, raw)],
            Value::Null,
        ),
        Activity::Failed => (vec![], vec![], json!({ "InstructionError": [0, "Custom"] })),
        Activity::Unrelated => (vec![], vec![], Value::Null),
    };

    serde_json::from_value(json!({
        "slot": 1,
        "blockTime": block_time,
        "transaction": {
            "signatures": [signature],
            "message": {
                "accountKeys": [
                    { "pubkey": wallet, "signer": true, "writable": true },
                    { "pubkey": "WalletTokenAccount111111111111111111111111", "signer": false, "writable": true },
                    { "pubkey": "PoolTokenAccount11111111111111111111111111", "signer": false, "writable": true }
                ],
                "instructions": [{ "programId": JUPITER }]
            }
        },
        "meta": {
            "err": err,
            "preTokenBalances": pre,
            "postTokenBalances": post,
            "innerInstructions": []
        }
    }))
    .unwrap()
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn token_mint(&self) -> &Pubkey {
        &self.mint
    }

    async fn snapshot_top_holders(&self, limit: usize) -> Result<Vec<TokenHolder>> {
        let mut state = self.state.lock().unwrap();
        state.snapshot_calls += 1;

        if let Some(error) = state.snapshot_failures.pop_front() {
            return Err(error);
        }

        let mut holders = state.holders.clone();
        holders.sort_by(|a, b| b.balance.total_cmp(&a.balance));
        holders.truncate(limit);
        Ok(holders)
    }

    async fn signatures_for_address(
        &self,
        _address: &Pubkey,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let mut state = self.state.lock().unwrap();
        state.listing_calls += 1;

        if state.listing_failures > 0 {
            state.listing_failures -= 1;
            return Err(TokenwiseError::Network("connection reset".to_string()));
        }

        let start = match before {
            Some(before) => match state.history.iter().position(|s| s.signature == before) {
                Some(index) => index + 1,
                None => return Ok(Vec::new()),
            },
            None => 0,
        };

        let until = if state.ignore_until { None } else { until };

        Ok(state.history[start..]
            .iter()
            .take_while(|s| Some(s.signature.as_str()) != until)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<Option<EncodedTransaction>> {
        let mut state = self.state.lock().unwrap();

        if state.never_served.contains(signature) || state.unavailable_once.remove(signature) {
            return Ok(None);
        }

        Ok(state.transactions.get(signature).cloned())
    }
}

/// Polls `condition` every 5ms until it holds or two seconds pass.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
