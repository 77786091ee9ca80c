//! Solana JSON-RPC adapter over HTTP.
//!
//! Holder snapshots:
//! - `limit <= 20`: `getTokenLargestAccounts` + `getMultipleAccounts` to resolve owners
//! - `limit > 20`: `getProgramAccounts` filtered on the mint (full scan)
//!
//! Transaction polling uses `getSignaturesForAddress` + `getTransaction`.

use {
    crate::{
        config::CommitmentLevel,
        error::{Result, TokenwiseError},
        ledger::{
            rpc_types::{
                ui_amount, EncodedTransaction, KeyedAccount, LargestTokenAccount, RpcAccount,
                RpcEnvelope, SignatureInfo, WithContext,
            },
            venue_scanner::TOKEN_2022_PROGRAM_ID,
            LedgerClient,
        },
        types::TokenHolder,
    },
    async_trait::async_trait,
    serde::de::DeserializeOwned,
    serde_json::{json, Value},
    solana_pubkey::Pubkey,
    std::{
        collections::HashMap,
        str::FromStr,
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    },
};

/// `getTokenLargestAccounts` never returns more than this many accounts
pub const LARGEST_ACCOUNTS_CAP: usize = 20;

/// Size of a classic SPL token account
const TOKEN_ACCOUNT_SIZE: u64 = 165;

/// JSON-RPC error codes meaning "node not ready / data not there yet"
const TRANSIENT_RPC_CODES: &[i64] = &[-32004, -32005, -32007, -32014, -32016];

pub struct RpcLedgerClient {
    http: reqwest::Client,
    url: String,
    commitment: CommitmentLevel,
    mint: Pubkey,
    request_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(url: impl Into<String>, mint: Pubkey, commitment: CommitmentLevel, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            url: url.into(),
            commitment,
            mint,
            request_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.http.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenwiseError::Network(format!("{} returned HTTP {}", method, status)));
        }

        let envelope: RpcEnvelope = response.json().await?;

        if let Some(error) = envelope.error {
            let message = format!("{} failed ({}): {}", method, error.code, error.message);
            return Err(if TRANSIENT_RPC_CODES.contains(&error.code) {
                TokenwiseError::Network(message)
            } else {
                TokenwiseError::Protocol(message)
            });
        }

        serde_json::from_value(envelope.result)
            .map_err(|e| TokenwiseError::Protocol(format!("{} result: {}", method, e)))
    }

    fn commitment_config(&self) -> Value {
        json!({ "commitment": self.commitment.as_str() })
    }

    async fn token_largest_accounts(&self) -> Result<Vec<LargestTokenAccount>> {
        let response: WithContext<Vec<LargestTokenAccount>> = self
            .call(
                "getTokenLargestAccounts",
                json!([self.mint.to_string(), self.commitment_config()]),
            )
            .await?;
        Ok(response.value)
    }

    async fn multiple_accounts(&self, keys: &[String]) -> Result<Vec<Option<RpcAccount>>> {
        let response: WithContext<Vec<Option<RpcAccount>>> = self
            .call(
                "getMultipleAccounts",
                json!([
                    keys,
                    { "encoding": "jsonParsed", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;
        Ok(response.value)
    }

    /// Program owning the mint account (SPL Token or Token-2022)
    async fn mint_program(&self) -> Result<String> {
        let response: WithContext<Option<RpcAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    self.mint.to_string(),
                    { "encoding": "jsonParsed", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;

        response
            .value
            .map(|account| account.owner)
            .ok_or_else(|| TokenwiseError::Protocol(format!("mint account {} not found", self.mint)))
    }

    async fn program_token_accounts(&self, program_id: &str) -> Result<Vec<KeyedAccount>> {
        let mut filters = vec![json!({ "memcmp": { "offset": 0, "bytes": self.mint.to_string() } })];

        // Token-2022 accounts carry extensions, so their size varies
        if program_id != TOKEN_2022_PROGRAM_ID {
            filters.push(json!({ "dataSize": TOKEN_ACCOUNT_SIZE }));
        }

        self.call(
            "getProgramAccounts",
            json!([
                program_id,
                {
                    "encoding": "jsonParsed",
                    "commitment": self.commitment.as_str(),
                    "filters": filters
                }
            ]),
        )
        .await
    }

    async fn holders_from_largest_accounts(&self, limit: usize) -> Result<Vec<TokenHolder>> {
        let largest = self.token_largest_accounts().await?;
        if largest.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = largest.iter().map(|a| a.address.clone()).collect();
        let accounts = self.multiple_accounts(&keys).await?;

        if accounts.len() != largest.len() {
            return Err(TokenwiseError::Protocol(format!(
                "getMultipleAccounts returned {} accounts for {} keys",
                accounts.len(),
                largest.len()
            )));
        }

        let mut entries = Vec::with_capacity(largest.len());
        for (entry, account) in largest.iter().zip(accounts) {
            let owner = match account.as_ref().and_then(RpcAccount::token_account_info) {
                Some(info) => info.owner,
                None => {
                    log::debug!("Token account {} vanished or is not parseable, skipping", entry.address);
                    continue;
                }
            };
            entries.push((owner, ui_amount(&entry.amount)?));
        }

        rank_holders(entries, limit)
    }

    async fn holders_from_program_accounts(&self, limit: usize) -> Result<Vec<TokenHolder>> {
        let program_id = self.mint_program().await?;
        let accounts = self.program_token_accounts(&program_id).await?;

        log::debug!("📊 Scanned {} token accounts for {}", accounts.len(), self.mint);

        let mint = self.mint.to_string();
        let entries = accounts
            .iter()
            .filter_map(|keyed| keyed.account.token_account_info())
            .filter(|info| info.mint == mint)
            .map(|info| -> Result<(String, f64)> {
                let balance = ui_amount(&info.token_amount)?;
                Ok((info.owner, balance))
            })
            .collect::<Result<Vec<_>>>()?;

        rank_holders(entries, limit)
    }
}

/// Sums balances per owner and keeps the `limit` largest, ordered by
/// balance descending then address ascending. Zero balances are dropped.
pub fn rank_holders(entries: Vec<(String, f64)>, limit: usize) -> Result<Vec<TokenHolder>> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (owner, balance) in entries {
        *totals.entry(owner).or_insert(0.0) += balance;
    }

    let mut holders = Vec::with_capacity(totals.len());
    for (owner, balance) in totals {
        if balance <= 0.0 {
            continue;
        }
        let address = Pubkey::from_str(&owner)
            .map_err(|e| TokenwiseError::Protocol(format!("invalid owner address '{}': {}", owner, e)))?;
        holders.push(TokenHolder::new(address, balance));
    }

    holders.sort_by(|a, b| {
        b.balance
            .total_cmp(&a.balance)
            .then_with(|| a.address.to_string().cmp(&b.address.to_string()))
    });
    holders.truncate(limit);

    Ok(holders)
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    fn token_mint(&self) -> &Pubkey {
        &self.mint
    }

    async fn snapshot_top_holders(&self, limit: usize) -> Result<Vec<TokenHolder>> {
        if limit <= LARGEST_ACCOUNTS_CAP {
            self.holders_from_largest_accounts(limit).await
        } else {
            self.holders_from_program_accounts(limit).await
        }
    }

    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let mut config = json!({
            "limit": limit,
            "commitment": self.commitment.as_str(),
        });
        if let Some(before) = before {
            config["before"] = json!(before);
        }
        if let Some(until) = until {
            config["until"] = json!(until);
        }

        self.call("getSignaturesForAddress", json!([address.to_string(), config]))
            .await
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<Option<EncodedTransaction>> {
        self.call(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "jsonParsed",
                    "commitment": self.commitment.as_str(),
                    "maxSupportedTransactionVersion": 0
                }
            ]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_holders_orders_and_truncates() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let c = Pubkey::new_unique();

        let holders = rank_holders(
            vec![
                (a.to_string(), 10.0),
                (b.to_string(), 100.0),
                (c.to_string(), 50.0),
            ],
            2,
        )
        .unwrap();

        assert_eq!(holders, vec![TokenHolder::new(b, 100.0), TokenHolder::new(c, 50.0)]);
    }

    #[test]
    fn test_rank_holders_sums_accounts_of_same_owner() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        let holders = rank_holders(
            vec![(a.to_string(), 30.0), (b.to_string(), 50.0), (a.to_string(), 30.0)],
            10,
        )
        .unwrap();

        assert_eq!(holders[0], TokenHolder::new(a, 60.0));
        assert_eq!(holders[1], TokenHolder::new(b, 50.0));
    }

    #[test]
    fn test_rank_holders_ties_break_by_address_and_zero_dropped() {
        let a = Pubkey::new_from_array([1u8; 32]);
        let b = Pubkey::new_from_array([2u8; 32]);
        let empty = Pubkey::new_from_array([3u8; 32]);

        let holders = rank_holders(
            vec![(b.to_string(), 5.0), (a.to_string(), 5.0), (empty.to_string(), 0.0)],
            10,
        )
        .unwrap();

        let expected_first = if a.to_string() < b.to_string() { a } else { b };
        assert_eq!(holders.len(), 2);
        assert_eq!(holders[0].address, expected_first);
    }

    #[test]
    fn test_rank_holders_rejects_bad_owner() {
        let err = rank_holders(vec![("bogus!".to_string(), 1.0)], 10).unwrap_err();
        assert!(matches!(err, TokenwiseError::Protocol(_)));
    }

    #[tokio::test]
    #[ignore] // Run only when testing against a live RPC endpoint
    async fn test_live_snapshot() {
        let url = std::env::var("RPC_URL").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
        let usdc = Pubkey::from_str("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap();
        let client = RpcLedgerClient::new(url, usdc, CommitmentLevel::Confirmed, Duration::from_secs(30)).unwrap();

        let holders = client.snapshot_top_holders(5).await.unwrap();
        assert!(!holders.is_empty());
        assert!(holders.windows(2).all(|w| w[0].balance >= w[1].balance));
    }
}
