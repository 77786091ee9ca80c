use {
    crate::{
        error::{Result, TokenwiseError},
        ledger::{
            balance_extractor::{extract_token_changes, owner_deltas, OwnerDelta},
            rpc_types::EncodedTransaction,
            venue_scanner::VenueScanner,
        },
        types::Transaction,
    },
    chrono::{DateTime, Utc},
    solana_pubkey::Pubkey,
    solana_signature::Signature,
    std::str::FromStr,
};

/// Picks the wallet whose balance change represents the trade.
///
/// The fee payer initiated the transaction, so its delta is preferred when it
/// moved the mint; otherwise the owner with the largest absolute change.
fn find_counterparty<'a>(owners: &'a [OwnerDelta], fee_payer: Option<&str>) -> Option<&'a OwnerDelta> {
    if let Some(payer) = fee_payer {
        if let Some(delta) = owners.iter().find(|d| d.owner == payer) {
            return Some(delta);
        }
    }

    owners.iter().max_by_key(|d| d.raw_change.abs())
}

/// Normalizes a `jsonParsed` transaction into a [`Transaction`] for `mint`.
///
/// Returns `Ok(None)` for failed transactions and for transactions that do
/// not change any balance of the mint. Fails with `Protocol` when the payload
/// is missing its signature or status meta.
pub fn normalize_transaction(
    encoded: &EncodedTransaction,
    mint: &Pubkey,
    scanner: &VenueScanner,
) -> Result<Option<Transaction>> {
    let signature = encoded
        .transaction
        .signatures
        .first()
        .ok_or_else(|| TokenwiseError::Protocol("transaction has no signatures".to_string()))?;

    Signature::from_str(signature).map_err(|e| {
        TokenwiseError::Protocol(format!("invalid transaction signature '{}': {}", signature, e))
    })?;

    let meta = encoded.meta.as_ref().ok_or_else(|| {
        TokenwiseError::Protocol(format!("transaction {} has no status meta", signature))
    })?;

    if meta.err.is_some() {
        log::debug!("Skipping failed transaction {}", signature);
        return Ok(None);
    }

    let account_keys = &encoded.transaction.message.account_keys;
    let deltas = extract_token_changes(meta)?;
    let owners = owner_deltas(&deltas, &mint.to_string(), account_keys);

    let fee_payer = account_keys.first().map(|k| k.pubkey.as_str());
    let counterparty = match find_counterparty(&owners, fee_payer) {
        Some(delta) => delta,
        None => {
            log::debug!(
                "No balance change for mint in {} ({} token deltas)",
                signature,
                deltas.len()
            );
            return Ok(None);
        }
    };

    let timestamp = encoded
        .block_time
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(|| {
            log::debug!("No block time for {}, using observation time", signature);
            Utc::now()
        });

    let protocol = scanner.venue_name(
        &encoded.transaction.message,
        meta.inner_instructions.as_deref(),
    );

    Ok(Some(Transaction {
        signature: signature.clone(),
        timestamp,
        wallet: counterparty.owner.clone(),
        amount: counterparty.ui_change.abs(),
        is_buy: counterparty.raw_change > 0,
        protocol,
    }))
}
