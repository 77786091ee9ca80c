//! Persistence of holder snapshots and observed transactions.

pub mod sqlite_pragma;
pub mod sqlite_store;

pub use sqlite_store::SqliteStore;

use {
    crate::{
        error::Result,
        types::{TokenHolder, Transaction},
    },
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Replaces the whole holder table. Readers see the old set or the new
    /// one, never a mix; on failure the old set remains.
    async fn replace_holder_snapshot(&self, holders: &[TokenHolder]) -> Result<()>;

    /// Inserts one transaction. Fails with `DuplicateKey` if the signature
    /// is already stored, leaving the stored record untouched.
    async fn append_transaction(&self, tx: &Transaction) -> Result<()>;

    /// All transactions, or those with `start <= timestamp <= end` when both
    /// bounds are given. A single bound is ignored.
    async fn query_transactions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>>;

    async fn query_holders(&self) -> Result<Vec<TokenHolder>>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
