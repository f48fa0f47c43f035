//! Error taxonomy shared by the ledger, the flow and the adapters.

use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No wallet for this user. User-correctable: they should create one.
    #[error("no wallet for user {0}")]
    NotFound(i64),

    #[error("wallet already exists for user {0}")]
    AlreadyExists(i64),

    /// Malformed amount or address. The conversation does not advance.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    /// Chain API, Telegram or risk endpoint unreachable or malformed.
    #[error("external service: {0}")]
    External(String),

    /// The tx hash is already in the log. Callers treat this as "already processed".
    #[error("transaction already recorded: {0}")]
    DuplicateTransaction(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("config: {0}")]
    Config(String),

    #[error("key derivation: {0}")]
    Key(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_duplicate(&self) -> bool { matches!(self, Self::DuplicateTransaction(_)) }

    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound(_)) }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self { Self::External(e.to_string()) }
}
