//! Serde shapes for the subset of Solana JSON-RPC responses the adapter reads.
//!
//! Only fields the adapter uses are declared; everything else in the payload
//! is ignored. Transactions are requested with `jsonParsed` encoding, in which
//! `accountKeys` already includes lookup-table addresses and every instruction
//! carries its `programId`.

use {
    crate::error::{Result, TokenwiseError},
    serde::Deserialize,
    serde_json::Value,
    solana_account_decoder_client_types::token::UiTokenAmount,
};

#[derive(Debug, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub result: Value,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct WithContext<T> {
    pub value: T,
}

/// Entry of `getTokenLargestAccounts`
#[derive(Debug, Clone, Deserialize)]
pub struct LargestTokenAccount {
    pub address: String,
    #[serde(flatten)]
    pub amount: UiTokenAmount,
}

/// Account as returned by `getAccountInfo` / `getMultipleAccounts` / `getProgramAccounts`
#[derive(Debug, Clone, Deserialize)]
pub struct RpcAccount {
    /// Owning program
    pub owner: String,
    pub data: Value,
}

impl RpcAccount {
    /// Decodes `data.parsed.info` of a `jsonParsed` SPL token account.
    pub fn token_account_info(&self) -> Option<TokenAccountInfo> {
        let parsed = self.data.get("parsed")?;
        if parsed.get("type").and_then(Value::as_str) != Some("account") {
            return None;
        }
        serde_json::from_value(parsed.get("info")?.clone()).ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountInfo {
    pub mint: String,
    pub owner: String,
    pub token_amount: UiTokenAmount,
}

/// Entry of `getProgramAccounts`
#[derive(Debug, Clone, Deserialize)]
pub struct KeyedAccount {
    pub pubkey: String,
    pub account: RpcAccount,
}

/// Entry of `getSignaturesForAddress` (newest first)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// `getTransaction` result with `jsonParsed` encoding
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedTransaction {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    pub transaction: UiTransaction,
    pub meta: Option<UiTransactionMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiTransaction {
    pub signatures: Vec<String>,
    pub message: UiMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub account_keys: Vec<UiAccountKey>,
    #[serde(default)]
    pub instructions: Vec<UiInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiAccountKey {
    pub pubkey: String,
    #[serde(default)]
    pub signer: bool,
    #[serde(default)]
    pub writable: bool,
}

/// Parsed or partially-decoded instruction; only the program id matters here
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInstruction {
    pub program_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<UiTokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<UiTokenBalance>>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<UiInnerInstructions>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiInnerInstructions {
    pub index: u8,
    pub instructions: Vec<UiInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenBalance {
    pub account_index: u16,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

/// UI amount of a token amount, preferring the exact string form when the
/// float is absent (the node omits `uiAmount` for very large values).
pub fn ui_amount(amount: &UiTokenAmount) -> Result<f64> {
    match amount.ui_amount {
        Some(value) => Ok(value),
        None => amount.ui_amount_string.parse().map_err(|e| {
            TokenwiseError::Protocol(format!(
                "unparseable uiAmountString '{}': {}",
                amount.ui_amount_string, e
            ))
        }),
    }
}
