//! Custodia: custodial TRON wallet bot. One wallet per chat user, USDT transfers
//! by conversation, incoming transfers pushed as notices.
//!
//! # Architecture
//!
//! ```text
//! Node (entry point)
//!   │
//!   ├── storage (SQLite)
//!   │     ├── Ledger          user → mnemonic + address
//!   │     └── TransactionLog  append-only, unique tx hash
//!   │
//!   ├── chain::TronGrid       ChainReader + ChainSubmitter
//!   ├── risk::AmlClient       advisory AML label
//!   ├── keys::TronKeychain    BIP39 → m/44'/195'/0'/0/0 → T-address
//!   │
//!   ├── bot
//!   │     ├── TransferFlow    commands, address → amount → confirm → submit
//!   │     └── Dispatcher      Telegram long poll, per-user ordering
//!   ├── observer              polls tracked addresses, logs + notifies
//!   └── server                GET /wallet-balance/{user_id}
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use custodia::{Node, NodeConfig};
//!
//! let node = Node::open(NodeConfig::from_env()?).await?;
//! let reply = node.flow().handle_text(42, "/start").await;
//! let report = node.observer(notifier).tick().await?;
//! ```

pub mod balance;
pub mod bot;
pub mod chain;
pub mod error;
pub mod keys;
pub mod logging;
pub mod node;
pub mod observer;
pub mod risk;
pub mod runtime;
pub mod server;
pub mod session;
pub mod storage;

pub use balance::WalletSummary;
pub use bot::{Dispatcher, Notifier, Reply, TelegramClient, TransferFlow};
pub use chain::{ChainConfig, ChainReader, ChainSubmitter, TronGrid};
pub use error::{Error, Result};
pub use node::{HttpConfig, Node, NodeConfig};
pub use observer::{ChainObserver, ObserverConfig, TickReport};
pub use risk::{AmlClient, RiskCheck, RiskConfig, RiskLabel};
pub use runtime::{install_signal_handlers, Shutdown};
pub use session::{ConversationState, MemorySessionStore, SessionStore};
