//! Ledger adapter: holder snapshots, signature polling and transaction
//! normalization for a single tracked mint.

pub mod backoff;
pub mod balance_extractor;
pub mod normalizer;
pub mod rpc_client;
pub mod rpc_types;
pub mod subscription;
pub mod venue_scanner;

pub use {
    normalizer::normalize_transaction,
    rpc_client::RpcLedgerClient,
    rpc_types::{EncodedTransaction, SignatureInfo},
    subscription::{
        subscribe_transactions, SubscriptionStats, TransactionHandler, TransactionSubscription,
    },
    venue_scanner::VenueScanner,
};

use {
    crate::{error::Result, types::TokenHolder},
    async_trait::async_trait,
    solana_pubkey::Pubkey,
};

/// Read access to the ledger for one mint.
///
/// Implemented over JSON-RPC by [`RpcLedgerClient`]; tests script their own.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn token_mint(&self) -> &Pubkey;

    /// The `limit` largest holders of the mint, balance descending.
    async fn snapshot_top_holders(&self, limit: usize) -> Result<Vec<TokenHolder>>;

    /// Signatures touching `address`, newest first.
    ///
    /// `before` starts the page below that signature, `until` stops at it
    /// (exclusive on both ends).
    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;

    /// `Ok(None)` when the node does not have the transaction (yet).
    async fn fetch_transaction(&self, signature: &str) -> Result<Option<EncodedTransaction>>;
}
