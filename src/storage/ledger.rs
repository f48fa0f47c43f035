//! Address ledger: one wallet per user, persisted in `wallets`.

use crate::error::{Error, Result};
use crate::keys::{KeyDerivation, SecretPhrase};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Wallet {
    pub user_id: i64,
    pub mnemonic: SecretPhrase,
    pub address: String,
}

#[derive(sqlx::FromRow)]
struct WalletRow {
    user_id: i64,
    mnemonic: String,
    address: String,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self { user_id: row.user_id, mnemonic: SecretPhrase::new(row.mnemonic), address: row.address }
    }
}

pub struct Ledger {
    pool: SqlitePool,
    keys: Arc<dyn KeyDerivation>,
}

impl Ledger {
    pub fn new(pool: SqlitePool, keys: Arc<dyn KeyDerivation>) -> Self { Self { pool, keys } }

    pub async fn find(&self, user_id: i64) -> Result<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>("SELECT user_id, mnemonic, address FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Wallet::from))
    }

    pub async fn get(&self, user_id: i64) -> Result<Wallet> {
        self.find(user_id).await?.ok_or(Error::NotFound(user_id))
    }

    /// Generate and store a wallet. Fails with `AlreadyExists` if the user has one.
    pub async fn create(&self, user_id: i64) -> Result<Wallet> {
        let generated = self.keys.generate()?;
        let result = sqlx::query(
            "INSERT INTO wallets (user_id, mnemonic, address, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(generated.mnemonic.expose())
        .bind(&generated.address)
        .bind(now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AlreadyExists(user_id));
        }
        tracing::info!(user_id, address = %generated.address, "wallet created");
        Ok(Wallet { user_id, mnemonic: generated.mnemonic.clone(), address: generated.address.clone() })
    }

    /// Delete the user's wallet (if any) and store a fresh one in one transaction.
    /// The old mnemonic is gone for good.
    pub async fn replace(&self, user_id: i64) -> Result<Wallet> {
        let generated = self.keys.generate()?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO wallets (user_id, mnemonic, address, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(generated.mnemonic.expose())
            .bind(&generated.address)
            .bind(now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id, address = %generated.address, "wallet replaced");
        Ok(Wallet { user_id, mnemonic: generated.mnemonic.clone(), address: generated.address.clone() })
    }

    /// Snapshot of every tracked (user_id, address) pair.
    pub async fn addresses(&self) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT user_id, address FROM wallets ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

fn now() -> String { chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string() }
