//! Chain observer - polls every tracked address for incoming token transfers.
//!
//! ```text
//! every poll_interval (retry_interval after a failure):
//!   for (user, address) in ledger:
//!     recent_transfers(address, page_size)
//!       └─ to == address, contract == token, not logged
//!            → append(incoming)  ── duplicate? skip
//!            → score sender → notify user
//! ```
//!
//! The transaction log's unique tx hash makes a tick idempotent. A transfer that
//! falls out of the most recent `page_size` between two ticks is missed.

use crate::bot::{text, Notifier, Reply};
use crate::chain::{from_base_units, ChainConfig, ChainReader, TOKEN_DECIMALS};
use crate::error::Result;
use crate::risk::RiskCheck;
use crate::storage::txlog::NewTransaction;
use crate::storage::{Direction, Ledger, TransactionLog};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    /// Transfers fetched per address per tick.
    pub page_size: u32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(15), retry_interval: Duration::from_secs(10), page_size: 5 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    pub recorded: usize,
    pub failed: usize,
}

pub struct ObserverDeps {
    pub ledger: Arc<Ledger>,
    pub txlog: TransactionLog,
    pub reader: Arc<dyn ChainReader>,
    pub risk: Arc<dyn RiskCheck>,
    pub notifier: Arc<dyn Notifier>,
    pub chain: ChainConfig,
    pub config: ObserverConfig,
}

pub struct ChainObserver {
    deps: ObserverDeps,
}

impl ChainObserver {
    pub fn new(deps: ObserverDeps) -> Self { Self { deps } }

    pub fn config(&self) -> &ObserverConfig { &self.deps.config }

    /// One pass over the ledger snapshot. Only a ledger read failure fails the tick;
    /// per-address failures are counted.
    pub async fn tick(&self) -> Result<TickReport> {
        let addresses = self.deps.ledger.addresses().await?;
        let mut report = TickReport::default();
        for (user_id, address) in addresses {
            report.scanned += 1;
            match self.scan_address(user_id, &address).await {
                Ok(recorded) => report.recorded += recorded,
                Err(e) => {
                    report.failed += 1;
                    warn!(user_id, address = %address, error = %e, "scan failed");
                }
            }
        }
        Ok(report)
    }

    async fn scan_address(&self, user_id: i64, address: &str) -> Result<usize> {
        let transfers = self.deps.reader.recent_transfers(address, self.deps.config.page_size).await?;
        let mut recorded = 0;
        for transfer in transfers {
            if transfer.to != address || transfer.token_contract != self.deps.chain.token_contract {
                continue;
            }
            if self.deps.txlog.exists(&transfer.tx_hash).await? {
                continue;
            }

            let amount = from_base_units(transfer.value, TOKEN_DECIMALS);
            let link = self.deps.chain.tx_link(&transfer.tx_hash);
            let record = NewTransaction {
                user_id,
                tx_hash: transfer.tx_hash.clone(),
                direction: Direction::Incoming,
                from_address: transfer.from.clone(),
                to_address: address.to_string(),
                amount,
                explorer_link: link.clone(),
            };
            match self.deps.txlog.append(&record).await {
                Ok(_) => recorded += 1,
                Err(e) if e.is_duplicate() => continue,
                Err(e) => return Err(e),
            }

            let label = self.deps.risk.score(&transfer.from).await;
            info!(user_id, tx_hash = %transfer.tx_hash, %amount, risk = %label, "incoming transfer");
            let reply = Reply::send(text::incoming(amount, &transfer.from, &label, &link));
            if let Err(e) = self.deps.notifier.notify(user_id, reply).await {
                warn!(user_id, tx_hash = %transfer.tx_hash, error = %e, "notify failed");
            }
        }
        Ok(recorded)
    }

    /// Tick until shutdown. Any failure switches the next wait to `retry_interval`.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            poll_secs = self.deps.config.poll_interval.as_secs(),
            page_size = self.deps.config.page_size,
            "observer started"
        );
        loop {
            let outcome = tokio::select! {
                _ = shutdown.recv() => break,
                outcome = self.tick() => outcome,
            };
            let delay = match outcome {
                Ok(report) if report.failed == 0 => {
                    if report.recorded > 0 {
                        info!(scanned = report.scanned, recorded = report.recorded, "tick");
                    } else {
                        debug!(scanned = report.scanned, "tick");
                    }
                    self.deps.config.poll_interval
                }
                Ok(report) => {
                    warn!(scanned = report.scanned, recorded = report.recorded, failed = report.failed, "tick with failures");
                    self.deps.config.retry_interval
                }
                Err(e) => {
                    error!(error = %e, "tick failed");
                    self.deps.config.retry_interval
                }
            };
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("observer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = ObserverConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.retry_interval, Duration::from_secs(10));
        assert_eq!(config.page_size, 5);
    }
}
