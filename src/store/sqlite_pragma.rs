use rusqlite::Connection;

/// Write-ahead logging with relaxed fsync; checkpoints every 1000 pages.
///
/// Returns the journal mode actually in effect (`memory` for in-memory databases).
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<String> {
    let journal_mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "wal_autocheckpoint", 1000)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    log::debug!("SQLite pragmas applied (journal_mode={})", journal_mode);
    Ok(journal_mode)
}
