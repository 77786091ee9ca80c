//! Read-only reports over a Tokenwise database.

use {
    chrono::{DateTime, Duration, Utc},
    clap::{Args, Parser, Subcommand, ValueEnum},
    std::path::PathBuf,
    tokenwise::{
        analytics::{export_csv, export_json, ActivitySummary},
        store::{SqliteStore, Store},
        types::{format_timestamp, parse_timestamp},
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database path (defaults to TOKENWISE_DB_PATH, then tokenwise.db)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current holder snapshot, largest first
    Holders,
    /// Stored transactions, oldest first
    Transactions {
        #[command(flatten)]
        range: TimeRange,
    },
    /// Buy/sell counts, volumes, protocol usage and most active wallets
    Summary {
        #[command(flatten)]
        range: TimeRange,

        /// Number of most active wallets to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Write transactions to a CSV or JSON file
    Export {
        #[arg(long, value_enum)]
        format: ExportFormat,

        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        range: TimeRange,
    },
}

const MAX_DAYS: i64 = 36_500;

#[derive(Args, Debug)]
struct TimeRange {
    /// Only the last N days, 1 to 36500 (overrides --start/--end)
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
    days: Option<i64>,

    /// Inclusive RFC 3339 lower bound, requires --end
    #[arg(long, value_parser = parse_time, requires = "end")]
    start: Option<DateTime<Utc>>,

    /// Inclusive RFC 3339 upper bound, requires --start
    #[arg(long, value_parser = parse_time, requires = "start")]
    end: Option<DateTime<Utc>>,
}

impl TimeRange {
    fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self.days {
            Some(days) => {
                let end = Utc::now();
                (Some(end - Duration::days(days)), Some(end))
            }
            None => (self.start, self.end),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).map_err(|e| format!("'{}' is not an RFC 3339 timestamp: {}", s, e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let db_path = cli.db.unwrap_or_else(|| {
        PathBuf::from(std::env::var("TOKENWISE_DB_PATH").unwrap_or_else(|_| "tokenwise.db".to_string()))
    });

    if !db_path.exists() {
        return Err(format!("database not found: {}", db_path.display()).into());
    }

    let store = SqliteStore::open(&db_path)?;

    match cli.command {
        Command::Holders => {
            let holders = store.query_holders().await?;
            println!("{:>4}  {:<44}  {:>20}", "#", "address", "balance");
            for (rank, holder) in holders.iter().enumerate() {
                println!("{:>4}  {:<44}  {:>20.6}", rank + 1, holder.address.to_string(), holder.balance);
            }
        }
        Command::Transactions { range } => {
            let (start, end) = range.bounds();
            let txs = store.query_transactions(start, end).await?;
            for tx in &txs {
                println!(
                    "{}  {:<4}  {:>16.6}  {:<44}  {:<10}  {}",
                    format_timestamp(&tx.timestamp),
                    if tx.is_buy { "BUY" } else { "SELL" },
                    tx.amount,
                    tx.wallet,
                    tx.protocol,
                    tx.signature
                );
            }
            println!("{} transactions", txs.len());
        }
        Command::Summary { range, top } => {
            let (start, end) = range.bounds();
            let txs = store.query_transactions(start, end).await?;
            let summary = ActivitySummary::from_transactions(&txs, top);

            println!("Transactions:  {}", summary.total());
            println!("Buys:          {} ({:.6} tokens)", summary.buys, summary.buy_volume);
            println!("Sells:         {} ({:.6} tokens)", summary.sells, summary.sell_volume);
            println!("Net direction: {}", summary.direction);

            println!();
            println!("Protocols:");
            for (protocol, count) in &summary.protocols {
                println!("  {:<12} {}", protocol, count);
            }

            println!();
            println!("Most active wallets:");
            for (wallet, count) in &summary.top_wallets {
                println!("  {:<44} {}", wallet, count);
            }
        }
        Command::Export { format, out, range } => {
            let (start, end) = range.bounds();
            let txs = store.query_transactions(start, end).await?;
            match format {
                ExportFormat::Csv => export_csv(&out, &txs)?,
                ExportFormat::Json => export_json(&out, &txs)?,
            }
            println!("Exported {} transactions to {}", txs.len(), out.display());
        }
    }

    Ok(())
}
