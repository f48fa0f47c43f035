//! In-process fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use custodia::bot::{Notifier, Reply};
use custodia::chain::{AccountInfo, ChainReader, ChainSubmitter, TokenTransfer, DEFAULT_TOKEN_CONTRACT};
use custodia::keys::PrivateKey;
use custodia::risk::{RiskCheck, RiskLabel};
use custodia::{storage, Error, Node, NodeConfig, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TARGET: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub from: String,
    pub to: String,
    pub amount: u128,
    pub key_matches: bool,
}

/// Chain with scripted balances and transfer history. Submissions are recorded.
#[derive(Default)]
pub struct FakeChain {
    pub accounts: Mutex<HashMap<String, AccountInfo>>,
    pub balances: Mutex<HashMap<String, u128>>,
    pub transfers: Mutex<HashMap<String, Vec<TokenTransfer>>>,
    pub failing: Mutex<HashSet<String>>,
    pub submitted: Mutex<Vec<Submitted>>,
    pub reject_submit: Mutex<bool>,
    counter: AtomicUsize,
}

impl FakeChain {
    pub fn set_balance(&self, address: &str, units: u128) {
        self.balances.lock().unwrap().insert(address.to_string(), units);
    }

    pub fn set_account(&self, address: &str, info: AccountInfo) {
        self.accounts.lock().unwrap().insert(address.to_string(), info);
    }

    pub fn push_transfer(&self, address: &str, transfer: TokenTransfer) {
        self.transfers.lock().unwrap().entry(address.to_string()).or_default().push(transfer);
    }

    pub fn fail(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn submissions(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    fn check(&self, address: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(address) {
            return Err(Error::External(format!("provider down for {address}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn get_account(&self, address: &str) -> Result<AccountInfo> {
        self.check(address)?;
        Ok(self.accounts.lock().unwrap().get(address).cloned().unwrap_or_default())
    }

    async fn recent_transfers(&self, address: &str, limit: u32) -> Result<Vec<TokenTransfer>> {
        self.check(address)?;
        let all = self.transfers.lock().unwrap().get(address).cloned().unwrap_or_default();
        Ok(all.into_iter().take(limit as usize).collect())
    }

    async fn token_balance(&self, address: &str) -> Result<u128> {
        self.check(address)?;
        Ok(self.balances.lock().unwrap().get(address).copied().unwrap_or(0))
    }
}

#[async_trait]
impl ChainSubmitter for FakeChain {
    async fn transfer(&self, from: &str, to: &str, amount: u128, key: &PrivateKey) -> Result<String> {
        if *self.reject_submit.lock().unwrap() {
            return Err(Error::External("broadcast rejected".into()));
        }
        let key_matches = key.address().map(|a| a == from).unwrap_or(false);
        self.submitted.lock().unwrap().push(Submitted { from: from.into(), to: to.into(), amount, key_matches });
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{:064x}", n + 1))
    }
}

/// Fixed label; remembers who was scored.
pub struct FakeRisk {
    pub label: String,
    pub scored: Mutex<Vec<String>>,
}

impl FakeRisk {
    pub fn new(label: &str) -> Self { Self { label: label.into(), scored: Mutex::new(Vec::new()) } }
}

#[async_trait]
impl RiskCheck for FakeRisk {
    async fn score(&self, address: &str) -> RiskLabel {
        self.scored.lock().unwrap().push(address.to_string());
        RiskLabel::new(&self.label)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, Reply)>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(i64, Reply)> { self.sent.lock().unwrap().clone() }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, reply: Reply) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(Error::External("telegram down".into()));
        }
        self.sent.lock().unwrap().push((user_id, reply));
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub node: Node,
    pub chain: Arc<FakeChain>,
    pub risk: Arc<FakeRisk>,
}

pub async fn harness() -> Harness {
    harness_with(NodeConfig::new("test")).await
}

pub async fn harness_with(config: NodeConfig) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let pool = storage::open(&dir.path().join("custodia.db")).await.expect("pool");
    let chain = Arc::new(FakeChain::default());
    let risk = Arc::new(FakeRisk::new("low"));
    let node = Node::from_parts(config, pool, chain.clone(), chain.clone(), risk.clone());
    Harness { dir, node, chain, risk }
}

pub fn incoming(tx_hash: &str, from: &str, to: &str, value: u128) -> TokenTransfer {
    TokenTransfer {
        tx_hash: tx_hash.into(),
        from: from.into(),
        to: to.into(),
        token_contract: DEFAULT_TOKEN_CONTRACT.into(),
        value,
        block_timestamp: 1_700_000_000_000,
    }
}
