//! Transaction log: append-only, unique on tx_hash.

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "incoming" => Some(Direction::Incoming),
            "outgoing" => Some(Direction::Outgoing),
            _ => None,
        }
    }
}

/// A transfer about to be logged.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub tx_hash: String,
    pub direction: Direction,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub explorer_link: String,
}

/// A logged transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub tx_hash: String,
    pub direction: Direction,
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    pub timestamp: String,
    pub explorer_link: String,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    user_id: i64,
    tx_hash: String,
    direction: String,
    from_address: String,
    to_address: String,
    amount: String,
    timestamp: String,
    explorer_link: String,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = Error;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| Error::InvalidInput(format!("direction '{}' in row {}", row.direction, row.id)))?;
        let amount = Decimal::from_str(&row.amount)
            .map_err(|e| Error::InvalidInput(format!("amount '{}' in row {}: {e}", row.amount, row.id)))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            tx_hash: row.tx_hash,
            direction,
            from_address: row.from_address,
            to_address: row.to_address,
            amount,
            timestamp: row.timestamp,
            explorer_link: row.explorer_link,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, tx_hash, direction, from_address, to_address, amount, timestamp, explorer_link FROM transactions";

#[derive(Clone)]
pub struct TransactionLog {
    pool: SqlitePool,
}

impl TransactionLog {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }

    pub async fn exists(&self, tx_hash: &str) -> Result<bool> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM transactions WHERE tx_hash = ?")
            .bind(tx_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Insert a record. A second record with the same hash is rejected with
    /// `DuplicateTransaction`, whoever got there first.
    pub async fn append(&self, tx: &NewTransaction) -> Result<TransactionRecord> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO transactions \
             (user_id, tx_hash, direction, from_address, to_address, amount, timestamp, explorer_link) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(tx_hash) DO NOTHING \
             RETURNING id",
        )
        .bind(tx.user_id)
        .bind(&tx.tx_hash)
        .bind(tx.direction.as_str())
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(tx.amount.to_string())
        .bind(&timestamp)
        .bind(&tx.explorer_link)
        .fetch_optional(&self.pool)
        .await;

        let id = match inserted {
            Ok(Some(id)) => id,
            Ok(None) => return Err(Error::DuplicateTransaction(tx.tx_hash.clone())),
            Err(e) if crate::storage::is_unique_violation(&e) => return Err(Error::DuplicateTransaction(tx.tx_hash.clone())),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(id, tx_hash = %tx.tx_hash, direction = tx.direction.as_str(), "transaction logged");
        Ok(TransactionRecord {
            id,
            user_id: tx.user_id,
            tx_hash: tx.tx_hash.clone(),
            direction: tx.direction,
            from_address: tx.from_address.clone(),
            to_address: tx.to_address.clone(),
            amount: tx.amount,
            timestamp,
            explorer_link: tx.explorer_link.clone(),
        })
    }

    /// All records for a user, oldest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!("{SELECT_COLUMNS} WHERE user_id = ? ORDER BY id ASC"))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TransactionRecord::try_from).collect()
    }

    /// The newest `limit` records for a user, still oldest first.
    pub async fn recent_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!("{SELECT_COLUMNS} WHERE user_id = ? ORDER BY id DESC LIMIT ?"))
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut records = rows.into_iter().map(TransactionRecord::try_from).collect::<Result<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }
}
