use {
    crate::{error::ConfigError, ledger::backoff::BackoffPolicy},
    solana_pubkey::Pubkey,
    std::{env, str::FromStr, time::Duration},
};

/// Commitment sent with every RPC request. `processed` is not offered:
/// `getSignaturesForAddress` and `getTransaction` reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentLevel {
    Confirmed,
    Finalized,
}

impl CommitmentLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitmentLevel::Confirmed => "confirmed",
            CommitmentLevel::Finalized => "finalized",
        }
    }
}

/// Settings for the signature polling subscription
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub poll_interval: Duration,
    /// Signatures requested per `getSignaturesForAddress` page (1..=1000)
    pub page_size: usize,
    pub max_pages_per_poll: usize,
    /// Recent signatures emitted when the subscription starts
    pub backfill: usize,
    /// Capacity of the recent-signature dedup set
    pub dedup_capacity: usize,
    /// Polls a listed signature may come back empty before it is skipped
    pub max_unavailable_polls: u32,
    pub backoff: BackoffPolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            page_size: 100,
            max_pages_per_poll: 10,
            backfill: 0,
            dedup_capacity: 10_000,
            max_unavailable_polls: 5,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub token_mint: Pubkey,
    pub rpc_url: String,
    pub commitment_level: CommitmentLevel,
    pub db_path: String,
    pub holder_limit: usize,
    /// `None` disables periodic snapshots (startup snapshot still runs)
    pub snapshot_interval: Option<Duration>,
    pub rpc_timeout: Duration,
    pub channel_buffer: usize,
    pub rust_log: String,
    pub subscription: SubscriptionConfig,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mint_str = env::var("TOKEN_MINT")
            .map_err(|_| ConfigError::MissingVariable("TOKEN_MINT".to_string()))?;
        let token_mint = parse_pubkey(mint_str.trim())?;

        let rpc_url = env::var("RPC_URL")
            .map_err(|_| ConfigError::MissingVariable("RPC_URL".to_string()))?;

        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "RPC_URL must start with http:// or https://".to_string(),
            ));
        }

        let commitment_str = env::var("COMMITMENT_LEVEL").unwrap_or_else(|_| "confirmed".to_string());
        let commitment_level = match commitment_str.to_lowercase().as_str() {
            "finalized" => CommitmentLevel::Finalized,
            "confirmed" => CommitmentLevel::Confirmed,
            "processed" => {
                return Err(ConfigError::InvalidValue(
                    "COMMITMENT_LEVEL processed is not supported for transaction history, use confirmed or finalized"
                        .to_string(),
                ));
            }
            _ => {
                log::warn!(
                    "Invalid COMMITMENT_LEVEL '{}', defaulting to confirmed",
                    commitment_str
                );
                CommitmentLevel::Confirmed
            }
        };

        let db_path = env::var("TOKENWISE_DB_PATH").unwrap_or_else(|_| "tokenwise.db".to_string());

        let holder_limit: usize = env_or("HOLDER_LIMIT", 60);
        if holder_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "HOLDER_LIMIT must be at least 1".to_string(),
            ));
        }

        let snapshot_interval_secs: u64 = env_or("SNAPSHOT_INTERVAL_SECS", 300);
        let snapshot_interval = if snapshot_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(snapshot_interval_secs))
        };

        let page_size: usize = env_or("SIGNATURE_PAGE_SIZE", 100);
        if !(1..=1000).contains(&page_size) {
            return Err(ConfigError::InvalidValue(format!(
                "SIGNATURE_PAGE_SIZE must be between 1 and 1000, got {}",
                page_size
            )));
        }

        let subscription = SubscriptionConfig {
            poll_interval: Duration::from_millis(env_or("POLL_INTERVAL_MS", 5_000)),
            page_size,
            max_pages_per_poll: env_or::<usize>("MAX_PAGES_PER_POLL", 10).max(1),
            backfill: env_or("BACKFILL", 0),
            max_unavailable_polls: env_or::<u32>("MAX_UNAVAILABLE_POLLS", 5).max(1),
            ..SubscriptionConfig::default()
        };

        Ok(Self {
            token_mint,
            rpc_url,
            commitment_level,
            db_path,
            holder_limit,
            snapshot_interval,
            rpc_timeout: Duration::from_secs(env_or("RPC_TIMEOUT_SECS", 15)),
            channel_buffer: env_or::<usize>("CHANNEL_BUFFER", 1_000).max(1),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            subscription,
        })
    }
}

pub fn parse_pubkey(s: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(s).map_err(|e| {
        ConfigError::InvalidValue(format!("'{}' is not a valid base58 pubkey: {}", s, e))
    })
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
