//! Storage - SQLite tables behind the address ledger and the transaction log
//!
//! ```text
//! SqlitePool (WAL, busy timeout)
//!     │
//!     ├── wallets       user_id PK, mnemonic, address UNIQUE    ← Ledger
//!     │
//!     └── transactions  id AUTOINCREMENT, tx_hash UNIQUE, ...   ← TransactionLog
//! ```
//!
//! Every call is a short statement or transaction on a pooled connection. The
//! storage engine is the only concurrency guard: UNIQUE(tx_hash) decides which of
//! two concurrent appends wins.

pub mod ledger;
pub mod txlog;

pub use ledger::{Ledger, Wallet};
pub use txlog::{Direction, TransactionLog, TransactionRecord};

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Open (creating if needed) the database file and bring the schema up to date.
pub async fn open(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| crate::Error::Config(format!("db dir: {e}")))?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;
    migrate(&pool).await?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// SQLite reports a UNIQUE violation as a database error with a constraint code.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
