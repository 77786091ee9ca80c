use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize, Serializer},
    solana_pubkey::Pubkey,
};

/// A wallet's balance of the tracked mint at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenHolder {
    #[serde(serialize_with = "serialize_pubkey")]
    pub address: Pubkey,
    /// UI amount (raw amount / 10^decimals)
    pub balance: f64,
}

impl TokenHolder {
    pub fn new(address: Pubkey, balance: f64) -> Self {
        Self { address, balance }
    }
}

/// One observed transfer of the tracked mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub signature: String,
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub wallet: String,
    pub amount: f64,
    #[serde(rename = "isBuy")]
    pub is_buy: bool,
    pub protocol: String,
}

/// Canonical storage form: `YYYY-MM-DDTHH:MM:SS.sssZ`.
///
/// Fixed width, so lexicographic order in SQLite equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts any RFC 3339 timestamp and normalizes it to UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn serialize_pubkey<S: Serializer>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(pubkey)
}

mod timestamp_format {
    use {
        chrono::{DateTime, Utc},
        serde::{Deserialize, Deserializer, Serializer},
    };

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}
