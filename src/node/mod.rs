//! Node - wires storage, chain, risk and sessions into the flow, observer and router
//!
//! ```text
//! NodeConfig ──► Node::open
//!                  ├── SqlitePool ─► Ledger, TransactionLog
//!                  ├── TronGrid   ─► ChainReader + ChainSubmitter
//!                  ├── AmlClient  ─► RiskCheck
//!                  └── MemorySessionStore
//!
//!   node.flow()            → TransferFlow   (bot)
//!   node.observer(notify)  → ChainObserver  (background loop)
//!   node.router()          → axum Router    (HTTP)
//! ```

mod config;

pub use config::{HttpConfig, NodeConfig};

use crate::bot::{FlowDeps, Notifier, TransferFlow};
use crate::chain::{ChainReader, ChainSubmitter, TronGrid};
use crate::error::Result;
use crate::keys::{KeyDerivation, TronKeychain};
use crate::observer::{ChainObserver, ObserverDeps};
use crate::risk::{AmlClient, RiskCheck};
use crate::server::{create_router, AppState};
use crate::session::{MemorySessionStore, SessionStore};
use crate::storage::{self, Ledger, TransactionLog};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

pub struct Node {
    config: NodeConfig,
    pool: SqlitePool,
    ledger: Arc<Ledger>,
    txlog: TransactionLog,
    reader: Arc<dyn ChainReader>,
    submitter: Arc<dyn ChainSubmitter>,
    risk: Arc<dyn RiskCheck>,
    keys: Arc<dyn KeyDerivation>,
    sessions: Arc<dyn SessionStore>,
}

impl Node {
    /// Open the database and build the network adapters from config.
    pub async fn open(config: NodeConfig) -> Result<Self> {
        let path = config.resolved_db_path();
        let pool = storage::open(&path).await?;
        let chain = Arc::new(TronGrid::new(config.chain.clone())?);
        let risk = Arc::new(AmlClient::new(config.risk.clone())?);
        info!(db = %path.display(), api = %config.chain.api_url, token = %config.chain.token_contract, "node opened");
        Ok(Self::from_parts(config, pool, chain.clone(), chain, risk))
    }

    /// Assemble around caller-supplied adapters.
    pub fn from_parts(
        config: NodeConfig,
        pool: SqlitePool,
        reader: Arc<dyn ChainReader>,
        submitter: Arc<dyn ChainSubmitter>,
        risk: Arc<dyn RiskCheck>,
    ) -> Self {
        let keys: Arc<dyn KeyDerivation> = Arc::new(TronKeychain::new());
        Self {
            ledger: Arc::new(Ledger::new(pool.clone(), keys.clone())),
            txlog: TransactionLog::new(pool.clone()),
            sessions: Arc::new(MemorySessionStore::new()),
            config,
            pool,
            reader,
            submitter,
            risk,
            keys,
        }
    }

    pub fn config(&self) -> &NodeConfig { &self.config }
    pub fn ledger(&self) -> Arc<Ledger> { self.ledger.clone() }
    pub fn txlog(&self) -> &TransactionLog { &self.txlog }

    pub fn flow(&self) -> TransferFlow {
        TransferFlow::new(FlowDeps {
            ledger: self.ledger.clone(),
            txlog: self.txlog.clone(),
            reader: self.reader.clone(),
            submitter: self.submitter.clone(),
            risk: self.risk.clone(),
            keys: self.keys.clone(),
            sessions: self.sessions.clone(),
            chain: self.config.chain.clone(),
            webapp_url: self.config.webapp_url.clone(),
        })
    }

    pub fn observer(&self, notifier: Arc<dyn Notifier>) -> ChainObserver {
        ChainObserver::new(ObserverDeps {
            ledger: self.ledger.clone(),
            txlog: self.txlog.clone(),
            reader: self.reader.clone(),
            risk: self.risk.clone(),
            notifier,
            chain: self.config.chain.clone(),
            config: self.config.observer.clone(),
        })
    }

    pub fn router(&self) -> axum::Router {
        let state = AppState::new(self.ledger.clone(), self.reader.clone(), self.config.app.clone());
        create_router(state, &self.config.http)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
