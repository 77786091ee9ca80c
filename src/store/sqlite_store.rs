use {
    crate::{
        error::{Result, TokenwiseError},
        store::{sqlite_pragma::apply_optimized_pragmas, Store},
        types::{format_timestamp, parse_timestamp, TokenHolder, Transaction},
    },
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    rusqlite::{params, Connection, Row},
    solana_pubkey::Pubkey,
    std::{
        path::Path,
        str::FromStr,
        sync::{Arc, Mutex, MutexGuard},
    },
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS holders (
        address TEXT PRIMARY KEY,
        balance REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transactions (
        signature TEXT PRIMARY KEY,
        timestamp TEXT NOT NULL,
        wallet TEXT NOT NULL,
        amount REAL NOT NULL,
        isBuy INTEGER NOT NULL,
        protocol TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(timestamp);
";

/// SQLite-backed [`Store`]. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TokenwiseError::Storage(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        let store = Self::init(conn)?;

        log::info!("✅ SQLite store ready at {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        apply_optimized_pragmas(&conn)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TokenwiseError::Storage("connection mutex poisoned".to_string()))
    }

    fn replace_holders(&self, holders: &[TokenHolder]) -> Result<()> {
        let mut conn = self.lock()?;
        // Dropping an uncommitted transaction rolls it back
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM holders", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO holders (address, balance) VALUES (?1, ?2)
                 ON CONFLICT(address) DO UPDATE SET balance = excluded.balance",
            )?;
            for holder in holders {
                stmt.execute(params![holder.address.to_string(), holder.balance])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn insert_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO transactions (signature, timestamp, wallet, amount, isBuy, protocol)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tx.signature,
                format_timestamp(&tx.timestamp),
                tx.wallet,
                tx.amount,
                tx.is_buy,
                tx.protocol,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Err(TokenwiseError::DuplicateKey(tx.signature.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn select_transactions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;

        let rows: Vec<(String, String, String, f64, bool, String)> = match (start, end) {
            (Some(start), Some(end)) => {
                let mut stmt = conn.prepare(
                    "SELECT signature, timestamp, wallet, amount, isBuy, protocol
                     FROM transactions
                     WHERE timestamp BETWEEN ?1 AND ?2
                     ORDER BY timestamp, signature",
                )?;
                let rows = stmt
                    .query_map(
                        params![format_timestamp(&start), format_timestamp(&end)],
                        transaction_columns,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            _ => {
                let mut stmt = conn.prepare(
                    "SELECT signature, timestamp, wallet, amount, isBuy, protocol
                     FROM transactions
                     ORDER BY timestamp, signature",
                )?;
                let rows = stmt
                    .query_map([], transaction_columns)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        rows.into_iter()
            .map(|(signature, timestamp, wallet, amount, is_buy, protocol)| {
                let timestamp = parse_timestamp(&timestamp).map_err(|e| {
                    TokenwiseError::Storage(format!(
                        "bad timestamp '{}' for {}: {}",
                        timestamp, signature, e
                    ))
                })?;
                Ok(Transaction {
                    signature,
                    timestamp,
                    wallet,
                    amount,
                    is_buy,
                    protocol,
                })
            })
            .collect()
    }

    fn select_holders(&self) -> Result<Vec<TokenHolder>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT address, balance FROM holders ORDER BY balance DESC, address")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(address, balance)| {
                let address = Pubkey::from_str(&address).map_err(|e| {
                    TokenwiseError::Storage(format!("bad holder address '{}': {}", address, e))
                })?;
                Ok(TokenHolder::new(address, balance))
            })
            .collect()
    }
}

fn transaction_columns(row: &Row<'_>) -> rusqlite::Result<(String, String, String, f64, bool, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

#[async_trait]
impl Store for SqliteStore {
    async fn replace_holder_snapshot(&self, holders: &[TokenHolder]) -> Result<()> {
        self.replace_holders(holders)?;
        log::debug!("💾 Holder snapshot replaced ({} holders)", holders.len());
        Ok(())
    }

    async fn append_transaction(&self, tx: &Transaction) -> Result<()> {
        self.insert_transaction(tx)
    }

    async fn query_transactions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>> {
        self.select_transactions(start, end)
    }

    async fn query_holders(&self) -> Result<Vec<TokenHolder>> {
        self.select_holders()
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
