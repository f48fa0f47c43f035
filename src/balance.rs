//! Balance summary - read-only projection of a wallet's on-chain state.
//!
//! Shared by the `/wallet` command and the HTTP endpoint. Provider failures
//! degrade to zeros; an unknown user is the caller's problem.

use crate::chain::{from_base_units, ChainReader, NATIVE_DECIMALS, TOKEN_DECIMALS};
use rust_decimal::Decimal;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSummary {
    pub address: String,
    pub activated: bool,
    /// TRX
    pub native_balance: Decimal,
    /// USDT
    pub token_balance: Decimal,
    pub energy: u64,
    pub bandwidth: u64,
    /// The provider could not be reached; figures are zeros.
    pub degraded: bool,
}

impl WalletSummary {
    fn empty(address: &str, degraded: bool) -> Self {
        Self {
            address: address.to_string(),
            activated: false,
            native_balance: Decimal::ZERO,
            token_balance: Decimal::ZERO,
            energy: 0,
            bandwidth: 0,
            degraded,
        }
    }
}

pub async fn summarize(chain: &dyn ChainReader, address: &str) -> WalletSummary {
    match chain.get_account(address).await {
        Ok(info) if !info.activated => WalletSummary::empty(address, false),
        Ok(info) => WalletSummary {
            address: address.to_string(),
            activated: true,
            native_balance: from_base_units(u128::from(info.native_balance), NATIVE_DECIMALS),
            token_balance: from_base_units(info.token_balance, TOKEN_DECIMALS),
            energy: info.energy,
            bandwidth: info.bandwidth,
            degraded: false,
        },
        Err(e) => {
            warn!(address, error = %e, "balance lookup failed");
            WalletSummary::empty(address, true)
        }
    }
}
