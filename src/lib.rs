//! Token holder and transaction tracker for a single Solana mint.
//!
//! The ingestion loop snapshots the largest holders into SQLite on an interval
//! and persists every transaction that moves the mint, as observed by a
//! polling JSON-RPC subscription.

pub mod analytics;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod store;
pub mod types;

pub use {
    error::{ConfigError, Result, TokenwiseError},
    types::{TokenHolder, Transaction},
};
