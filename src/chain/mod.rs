//! Chain - read and submit capabilities against the TRON network
//!
//! ```text
//! ChainReader ──── get_account / recent_transfers / token_balance ───┐
//!                                                                     ├── TronGrid (HTTP)
//! ChainSubmitter ─ transfer: trigger → sign txID → broadcast → wait ─┘
//! ```
//!
//! The node API builds transactions and computes fees. This crate only signs the
//! transaction id it hands back.

mod trongrid;

pub use trongrid::TronGrid;

use crate::error::{Error, Result};
use crate::keys::PrivateKey;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;

/// Mainnet USDT (TRC-20).
pub const DEFAULT_TOKEN_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
/// USDT and TRX (sun) both use 6 decimals.
pub const TOKEN_DECIMALS: u32 = 6;
pub const NATIVE_DECIMALS: u32 = 6;

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub token_contract: String,
    /// Max fee per transfer, in sun.
    pub fee_limit: u64,
    pub explorer_url: String,
    pub request_timeout: Duration,
    pub confirm_timeout: Duration,
    pub confirm_poll: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.trongrid.io".into(),
            api_key: None,
            token_contract: DEFAULT_TOKEN_CONTRACT.into(),
            fee_limit: 100_000_000,
            explorer_url: "https://tronscan.org".into(),
            request_timeout: Duration::from_secs(15),
            confirm_timeout: Duration::from_secs(60),
            confirm_poll: Duration::from_secs(3),
        }
    }
}

impl ChainConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self { self.api_url = url.into(); self }
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self { self.api_key = Some(key.into()); self }

    pub fn tx_link(&self, tx_hash: &str) -> String {
        format!("{}/#/transaction/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn address_link(&self, address: &str) -> String {
        format!("{}/#/address/{}", self.explorer_url.trim_end_matches('/'), address)
    }
}

/// Account snapshot. A never-activated address reads as all zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub activated: bool,
    /// sun
    pub native_balance: u64,
    /// Base units of the configured token.
    pub token_balance: u128,
    pub energy: u64,
    pub bandwidth: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenTransfer {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub token_contract: String,
    /// Base units.
    pub value: u128,
    pub block_timestamp: i64,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn get_account(&self, address: &str) -> Result<AccountInfo>;
    /// Newest token transfers touching `address`, at most `limit`.
    async fn recent_transfers(&self, address: &str, limit: u32) -> Result<Vec<TokenTransfer>>;
    /// Current on-chain token balance (contract `balanceOf`), base units.
    async fn token_balance(&self, address: &str) -> Result<u128>;
}

#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    /// Sign, broadcast and wait for the transfer. Returns the transaction id.
    async fn transfer(&self, from: &str, to: &str, amount: u128, key: &PrivateKey) -> Result<String>;
}

/// Whole tokens to base units. Rejects non-positive amounts and more than
/// `TOKEN_DECIMALS` fractional digits.
pub fn to_base_units(amount: Decimal) -> Result<u128> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!("amount must be positive: {amount}")));
    }
    let scaled = amount
        .checked_mul(Decimal::from(10u64.pow(TOKEN_DECIMALS)))
        .ok_or_else(|| Error::InvalidInput(format!("amount too large: {amount}")))?;
    if !scaled.fract().is_zero() {
        return Err(Error::InvalidInput(format!("at most {TOKEN_DECIMALS} decimal places: {amount}")));
    }
    scaled
        .to_u128()
        .ok_or_else(|| Error::InvalidInput(format!("amount out of range: {amount}")))
}

pub fn from_base_units(units: u128, decimals: u32) -> Decimal {
    i128::try_from(units)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals).ok())
        .map(|d| d.normalize())
        .unwrap_or(Decimal::MAX)
}
