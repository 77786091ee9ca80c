use {
    crate::{
        error::{Result, TokenwiseError},
        ledger::rpc_types::{ui_amount, UiAccountKey, UiTokenBalance, UiTransactionMeta},
    },
    std::collections::BTreeMap,
};

/// Change of one token account's balance across a transaction
#[derive(Debug, Clone)]
pub struct BalanceDelta {
    pub account_index: usize,
    pub mint: String,
    /// Wallet owning the token account, when the node reports it
    pub owner: Option<String>,
    pub raw_change: i128,
    pub ui_change: f64,
}

/// Net change of one wallet's holdings of a single mint
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerDelta {
    pub owner: String,
    pub raw_change: i128,
    pub ui_change: f64,
}

fn raw_amount(balance: &UiTokenBalance) -> Result<u64> {
    balance.ui_token_amount.amount.parse::<u64>().map_err(|e| {
        TokenwiseError::Protocol(format!(
            "unparseable token amount '{}' at account index {}: {}",
            balance.ui_token_amount.amount, balance.account_index, e
        ))
    })
}

/// Token balance changes from pre/post token balances.
///
/// Accounts present only in `pre` were closed (post = 0); accounts present
/// only in `post` were created (pre = 0).
pub fn extract_token_changes(meta: &UiTransactionMeta) -> Result<Vec<BalanceDelta>> {
    let empty = Vec::new();
    let pre_token_balances = meta.pre_token_balances.as_ref().unwrap_or(&empty);
    let post_token_balances = meta.post_token_balances.as_ref().unwrap_or(&empty);

    let mut deltas = Vec::new();

    for pre in pre_token_balances {
        let post = post_token_balances
            .iter()
            .find(|p| p.account_index == pre.account_index);

        let pre_raw = raw_amount(pre)?;
        let pre_ui = ui_amount(&pre.ui_token_amount)?;

        let (post_raw, post_ui) = match post {
            Some(p) => (raw_amount(p)?, ui_amount(&p.ui_token_amount)?),
            None => (0, 0.0),
        };

        let raw_change = (post_raw as i128) - (pre_raw as i128);
        if raw_change == 0 {
            continue;
        }

        deltas.push(BalanceDelta {
            account_index: pre.account_index as usize,
            mint: pre.mint.clone(),
            owner: pre.owner.clone().or_else(|| post.and_then(|p| p.owner.clone())),
            raw_change,
            ui_change: post_ui - pre_ui,
        });
    }

    for post in post_token_balances {
        let exists_in_pre = pre_token_balances
            .iter()
            .any(|pre| pre.account_index == post.account_index);

        if exists_in_pre {
            continue;
        }

        let post_raw = raw_amount(post)?;
        if post_raw > 0 {
            deltas.push(BalanceDelta {
                account_index: post.account_index as usize,
                mint: post.mint.clone(),
                owner: post.owner.clone(),
                raw_change: post_raw as i128,
                ui_change: ui_amount(&post.ui_token_amount)?,
            });
        }
    }

    Ok(deltas)
}

/// Sums the deltas of `mint` per owning wallet, dropping wallets whose net
/// change is zero. Ordered by owner address.
///
/// Old transactions lack `owner` in token balances; the token account key is
/// used in its place.
pub fn owner_deltas(deltas: &[BalanceDelta], mint: &str, account_keys: &[UiAccountKey]) -> Vec<OwnerDelta> {
    let mut by_owner: BTreeMap<String, (i128, f64)> = BTreeMap::new();

    for delta in deltas.iter().filter(|d| d.mint == mint) {
        let owner = match &delta.owner {
            Some(owner) => owner.clone(),
            None => match account_keys.get(delta.account_index) {
                Some(key) => key.pubkey.clone(),
                None => {
                    log::warn!(
                        "⚠️  Token account index {} out of bounds (len: {})",
                        delta.account_index,
                        account_keys.len()
                    );
                    continue;
                }
            },
        };

        let entry = by_owner.entry(owner).or_insert((0, 0.0));
        entry.0 += delta.raw_change;
        entry.1 += delta.ui_change;
    }

    by_owner
        .into_iter()
        .filter(|(_, (raw, _))| *raw != 0)
        .map(|(owner, (raw_change, ui_change))| OwnerDelta {
            owner,
            raw_change,
            ui_change,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MINT: &str = "9BB6NFEcjBCtnNLFko2FqVQBq8HHM13kCyYcdQbgpump";

    fn balance(index: u16, mint: &str, owner: Option<&str>, raw: u64, decimals: u8) -> serde_json::Value {
        let ui = raw as f64 / 10f64.powi(decimals as i32);
        json!({
            "accountIndex": index,
            "mint": mint,
            "owner": owner,
            "uiTokenAmount": {
                "amount": raw.to_string(),
                "decimals": decimals,
                "uiAmount": ui,
                "uiAmountString": ui.to_string()
            }
        })
    }

    fn meta(pre: Vec<serde_json::Value>, post: Vec<serde_json::Value>) -> UiTransactionMeta {
        serde_json::from_value(json!({
            "err": null,
            "preTokenBalances": pre,
            "postTokenBalances": post
        }))
        .unwrap()
    }

    #[test]
    fn test_changed_created_and_closed_accounts() {
        let meta = meta(
            vec![
                balance(1, MINT, Some("buyer"), 0, 6),
                balance(2, MINT, Some("pool"), 5_000_000, 6),
                balance(3, MINT, Some("closer"), 2_000_000, 6),
            ],
            vec![
                balance(1, MINT, Some("buyer"), 1_500_000, 6),
                balance(2, MINT, Some("pool"), 3_500_000, 6),
                balance(4, MINT, Some("newcomer"), 250_000, 6),
            ],
        );

        let deltas = extract_token_changes(&meta).unwrap();
        assert_eq!(deltas.len(), 4);

        let by_index = |i: usize| deltas.iter().find(|d| d.account_index == i).unwrap();
        assert_eq!(by_index(1).raw_change, 1_500_000);
        assert_eq!(by_index(2).raw_change, -1_500_000);
        assert_eq!(by_index(3).raw_change, -2_000_000);
        assert_eq!(by_index(3).ui_change, -2.0);
        assert_eq!(by_index(4).ui_change, 0.25);
    }

    #[test]
    fn test_unchanged_accounts_are_skipped() {
        let meta = meta(
            vec![balance(1, MINT, Some("a"), 100, 0)],
            vec![balance(1, MINT, Some("a"), 100, 0)],
        );
        assert!(extract_token_changes(&meta).unwrap().is_empty());
    }

    #[test]
    fn test_missing_balance_lists() {
        let meta: UiTransactionMeta = serde_json::from_value(json!({ "err": null })).unwrap();
        assert!(extract_token_changes(&meta).unwrap().is_empty());
    }

    #[test]
    fn test_unparseable_amount_is_protocol_error() {
        let mut bad = balance(1, MINT, Some("a"), 0, 6);
        bad["uiTokenAmount"]["amount"] = json!("12abc");
        let meta = meta(vec![bad], vec![balance(1, MINT, Some("a"), 5, 6)]);

        assert!(matches!(extract_token_changes(&meta), Err(TokenwiseError::Protocol(_))));
    }

    #[test]
    fn test_owner_deltas_sum_per_wallet_and_filter_mint() {
        let meta = meta(
            vec![
                balance(1, MINT, Some("wallet"), 1_000, 0),
                balance(2, MINT, Some("wallet"), 1_000, 0),
                balance(3, "OtherMint", Some("wallet"), 10, 0),
            ],
            vec![
                balance(1, MINT, Some("wallet"), 1_500, 0),
                balance(2, MINT, Some("wallet"), 1_200, 0),
                balance(3, "OtherMint", Some("wallet"), 0, 0),
            ],
        );

        let owners = owner_deltas(&extract_token_changes(&meta).unwrap(), MINT, &[]);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].owner, "wallet");
        assert_eq!(owners[0].raw_change, 700);
    }

    #[test]
    fn test_owner_deltas_net_zero_dropped() {
        let meta = meta(
            vec![
                balance(1, MINT, Some("wallet"), 1_000, 0),
                balance(2, MINT, Some("wallet"), 0, 0),
            ],
            vec![
                balance(1, MINT, Some("wallet"), 0, 0),
                balance(2, MINT, Some("wallet"), 1_000, 0),
            ],
        );

        assert!(owner_deltas(&extract_token_changes(&meta).unwrap(), MINT, &[]).is_empty());
    }

    #[test]
    fn test_owner_falls_back_to_token_account_key() {
        let meta = meta(vec![balance(1, MINT, None, 0, 0)], vec![balance(1, MINT, None, 5, 0)]);
        let keys: Vec<UiAccountKey> = serde_json::from_value(json!([
            { "pubkey": "payer", "signer": true, "writable": true },
            { "pubkey": "tokenAccount", "signer": false, "writable": true }
        ]))
        .unwrap();

        let owners = owner_deltas(&extract_token_changes(&meta).unwrap(), MINT, &keys);
        assert_eq!(owners[0].owner, "tokenAccount");
    }
}
