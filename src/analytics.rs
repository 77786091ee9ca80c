//! Activity summaries and exports over stored transactions.

use {
    crate::{
        error::{Result, TokenwiseError},
        types::Transaction,
    },
    serde::Serialize,
    std::{collections::HashMap, fmt, fs::File, io::Write, path::Path},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetDirection {
    BuyHeavy,
    SellHeavy,
    Balanced,
}

impl fmt::Display for NetDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetDirection::BuyHeavy => write!(f, "Buy-Heavy"),
            NetDirection::SellHeavy => write!(f, "Sell-Heavy"),
            NetDirection::Balanced => write!(f, "Balanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub buys: usize,
    pub sells: usize,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub direction: NetDirection,
    /// (protocol, transaction count), most used first
    pub protocols: Vec<(String, usize)>,
    /// (wallet, transaction count), most active first
    pub top_wallets: Vec<(String, usize)>,
}

impl ActivitySummary {
    pub fn from_transactions(txs: &[Transaction], top_wallets: usize) -> Self {
        let (buys, sells): (Vec<&Transaction>, Vec<&Transaction>) = txs.iter().partition(|tx| tx.is_buy);

        let direction = match buys.len().cmp(&sells.len()) {
            std::cmp::Ordering::Greater => NetDirection::BuyHeavy,
            std::cmp::Ordering::Less => NetDirection::SellHeavy,
            std::cmp::Ordering::Equal => NetDirection::Balanced,
        };

        let mut wallets = ranked_counts(txs.iter().map(|tx| tx.wallet.as_str()));
        wallets.truncate(top_wallets);

        Self {
            buys: buys.len(),
            sells: sells.len(),
            buy_volume: buys.iter().map(|tx| tx.amount).sum(),
            sell_volume: sells.iter().map(|tx| tx.amount).sum(),
            direction,
            protocols: ranked_counts(txs.iter().map(|tx| tx.protocol.as_str())),
            top_wallets: wallets,
        }
    }

    pub fn total(&self) -> usize {
        self.buys + self.sells
    }
}

/// Occurrence counts, descending by count then ascending by key
fn ranked_counts<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(key, count)| (key.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

pub fn write_json<W: Write>(writer: W, txs: &[Transaction]) -> Result<()> {
    serde_json::to_writer_pretty(writer, txs).map_err(|e| TokenwiseError::Storage(e.to_string()))
}

pub fn write_csv<W: Write>(writer: W, txs: &[Transaction]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for tx in txs {
        csv_writer.serialize(tx)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn create_output(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

/// Pretty JSON array of transaction records
pub fn export_json(path: &Path, txs: &[Transaction]) -> Result<()> {
    write_json(create_output(path)?, txs)?;
    log::info!("📁 Exported {} transactions to {}", txs.len(), path.display());
    Ok(())
}

/// CSV with header `signature,timestamp,wallet,amount,isBuy,protocol`
pub fn export_csv(path: &Path, txs: &[Transaction]) -> Result<()> {
    write_csv(create_output(path)?, txs)?;
    log::info!("📁 Exported {} transactions to {}", txs.len(), path.display());
    Ok(())
}
