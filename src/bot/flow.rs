//! Transfer flow - commands, address entry, amount, confirmation.
//!
//! ```text
//!            address text              "send"                amount text
//!   Idle ───────────────► Entered ───────────► AwaitingAmount ───────────► AwaitingConfirmation
//!    ▲                       │ "check risk"        │ bad amount: stays        │ yes → submit
//!    │                       ▼                     ▼                          │ no  → cancel
//!    └──────────── score, reply ◄──────── any command clears ◄───────────────┘
//! ```
//!
//! Callers serialize updates per user; the flow itself holds no locks.

use super::{text, Action, Button, ButtonOutcome, Reply};
use crate::balance;
use crate::chain::{from_base_units, to_base_units, ChainConfig, ChainReader, ChainSubmitter, TOKEN_DECIMALS};
use crate::error::{Error, Result};
use crate::keys::{looks_like_address, KeyDerivation};
use crate::risk::RiskCheck;
use crate::session::{ConversationState, SessionStore};
use crate::storage::txlog::NewTransaction;
use crate::storage::{Direction, Ledger, TransactionLog};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How many records `/history` shows.
pub const HISTORY_LIMIT: u32 = 10;

/// Everything the flow talks to.
pub struct FlowDeps {
    pub ledger: Arc<Ledger>,
    pub txlog: TransactionLog,
    pub reader: Arc<dyn ChainReader>,
    pub submitter: Arc<dyn ChainSubmitter>,
    pub risk: Arc<dyn RiskCheck>,
    pub keys: Arc<dyn KeyDerivation>,
    pub sessions: Arc<dyn SessionStore>,
    pub chain: ChainConfig,
    pub webapp_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Wallet,
    History,
    App,
    Cancel,
}

impl Command {
    /// `/name` or `/name@botname`, optionally followed by arguments.
    fn parse(text: &str) -> Option<Self> {
        let word = text.strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name {
            "start" => Some(Command::Start),
            "wallet" => Some(Command::Wallet),
            "history" => Some(Command::History),
            "app" => Some(Command::App),
            "cancel" => Some(Command::Cancel),
            _ => None,
        }
    }
}

pub struct TransferFlow {
    deps: FlowDeps,
}

impl TransferFlow {
    pub fn new(deps: FlowDeps) -> Self { Self { deps } }

    pub async fn state(&self, user_id: i64) -> ConversationState { self.deps.sessions.get(user_id).await }

    /// A plain text message. `None` means the message is ignored.
    pub async fn handle_text(&self, user_id: i64, message: &str) -> Option<Reply> {
        let message = message.trim();
        if let Some(command) = Command::parse(message) {
            self.deps.sessions.clear(user_id).await;
            return Some(self.handle_command(user_id, command).await);
        }

        match self.deps.sessions.get(user_id).await {
            ConversationState::AwaitingAmount { target } => Some(self.enter_amount(user_id, target, message).await),
            _ if looks_like_address(message) => {
                let target = message.to_string();
                self.deps
                    .sessions
                    .set(user_id, ConversationState::AddressEntered { target: target.clone() })
                    .await;
                Some(Reply::send(text::choose_action(&target)).with_row(vec![
                    Button::callback("💸 Send USDT", Action::SendToken),
                    Button::callback("🔎 Check AML", Action::CheckRisk),
                ]))
            }
            _ => None,
        }
    }

    /// Raw callback data. Unknown data is ignored.
    pub async fn handle_button(&self, user_id: i64, data: &str) -> ButtonOutcome {
        match Action::parse(data) {
            Some(action) => self.handle_action(user_id, action).await,
            None => {
                warn!(user_id, data, "unknown callback data");
                ButtonOutcome::ignored()
            }
        }
    }

    pub async fn handle_action(&self, user_id: i64, action: Action) -> ButtonOutcome {
        let state = self.deps.sessions.get(user_id).await;
        match action {
            Action::SendToken => match state.target() {
                Some(target) => {
                    let target = target.to_string();
                    let reply = Reply::edit(text::ask_amount(&target));
                    self.deps.sessions.set(user_id, ConversationState::AwaitingAmount { target }).await;
                    ButtonOutcome::reply(reply)
                }
                None => ButtonOutcome::alert(text::no_address_selected()),
            },
            Action::CheckRisk => match state.target() {
                Some(target) => {
                    let target = target.to_string();
                    self.deps.sessions.clear(user_id).await;
                    let label = self.deps.risk.score(&target).await;
                    info!(user_id, address = %target, risk = %label, "risk checked");
                    ButtonOutcome::reply(Reply::edit(text::risk_result(&target, &label)))
                }
                None => ButtonOutcome::alert(text::no_address_selected()),
            },
            Action::ConfirmYes => match state {
                ConversationState::AwaitingConfirmation { target, amount } => {
                    // Cleared before submitting: a second "yes" finds Idle.
                    self.deps.sessions.clear(user_id).await;
                    ButtonOutcome::reply(self.submit(user_id, &target, amount).await)
                }
                _ => ButtonOutcome::ignored(),
            },
            Action::ConfirmNo => match state {
                ConversationState::AwaitingConfirmation { .. } => {
                    self.deps.sessions.clear(user_id).await;
                    ButtonOutcome::reply(Reply::edit(text::transfer_cancelled()))
                }
                _ => ButtonOutcome::ignored(),
            },
            Action::RecreateWallet => match self.deps.ledger.replace(user_id).await {
                Ok(wallet) => ButtonOutcome::reply(Reply::send(text::wallet_created(&wallet))),
                Err(e) => {
                    error!(user_id, error = %e, "wallet replace failed");
                    ButtonOutcome::reply(Reply::send(text::internal_error()))
                }
            },
            Action::KeepWallet => ButtonOutcome::reply(Reply::edit(text::wallet_kept())),
        }
    }

    async fn handle_command(&self, user_id: i64, command: Command) -> Reply {
        let result = match command {
            Command::Start => self.start(user_id).await,
            Command::Wallet => self.wallet(user_id).await,
            Command::History => self.history(user_id).await,
            Command::App => Ok(self.app()),
            Command::Cancel => Ok(Reply::send(text::cancelled())),
        };
        result.unwrap_or_else(|e| {
            error!(user_id, ?command, error = %e, "command failed");
            Reply::send(text::internal_error())
        })
    }

    async fn start(&self, user_id: i64) -> Result<Reply> {
        if let Some(wallet) = self.deps.ledger.find(user_id).await? {
            return Ok(offer_recreate(&wallet.address));
        }
        match self.deps.ledger.create(user_id).await {
            Ok(wallet) => Ok(Reply::send(text::wallet_created(&wallet))),
            // Lost a race with another /start for the same user.
            Err(Error::AlreadyExists(_)) => {
                let wallet = self.deps.ledger.get(user_id).await?;
                Ok(offer_recreate(&wallet.address))
            }
            Err(e) => Err(e),
        }
    }

    async fn wallet(&self, user_id: i64) -> Result<Reply> {
        let Some(wallet) = self.deps.ledger.find(user_id).await? else {
            return Ok(Reply::send(text::no_wallet()));
        };
        let summary = balance::summarize(self.deps.reader.as_ref(), &wallet.address).await;
        Ok(Reply::send(text::wallet_summary(&summary, &self.deps.chain.address_link(&wallet.address))))
    }

    async fn history(&self, user_id: i64) -> Result<Reply> {
        let records = self.deps.txlog.recent_for_user(user_id, HISTORY_LIMIT).await?;
        Ok(Reply::send(text::history(&records)))
    }

    fn app(&self) -> Reply {
        match &self.deps.webapp_url {
            Some(url) => Reply::send(text::app_link()).with_row(vec![Button::web_app("📱 Open wallet", url.clone())]),
            None => Reply::send(text::app_unavailable()),
        }
    }

    async fn enter_amount(&self, user_id: i64, target: String, message: &str) -> Reply {
        match parse_amount(message) {
            Ok(amount) => {
                let reply = Reply::send(text::confirm_transfer(&target, amount)).with_row(vec![
                    Button::callback("✅ Yes", Action::ConfirmYes),
                    Button::callback("❌ No", Action::ConfirmNo),
                ]);
                self.deps
                    .sessions
                    .set(user_id, ConversationState::AwaitingConfirmation { target, amount })
                    .await;
                reply
            }
            Err(_) => Reply::send(text::invalid_amount()),
        }
    }

    async fn submit(&self, user_id: i64, target: &str, amount: Decimal) -> Reply {
        match self.try_submit(user_id, target, amount).await {
            Ok(txid) => Reply::edit(text::transfer_sent(amount, target, &self.deps.chain.tx_link(&txid))),
            Err(Error::NotFound(_)) => Reply::edit(text::no_wallet()),
            Err(Error::InsufficientFunds { requested, available }) => {
                Reply::edit(text::insufficient_funds(requested, available))
            }
            Err(e) => {
                error!(user_id, to = target, %amount, error = %e, "transfer failed");
                Reply::edit(text::transfer_failed())
            }
        }
    }

    async fn try_submit(&self, user_id: i64, target: &str, amount: Decimal) -> Result<String> {
        let wallet = self.deps.ledger.get(user_id).await?;
        let units = to_base_units(amount)?;

        let available = self.deps.reader.token_balance(&wallet.address).await?;
        if available < units {
            return Err(Error::InsufficientFunds { requested: amount, available: from_base_units(available, TOKEN_DECIMALS) });
        }

        let key = self.deps.keys.derive(&wallet.mnemonic)?;
        let txid = self.deps.submitter.transfer(&wallet.address, target, units, &key).await?;
        info!(user_id, txid = %txid, %amount, "transfer submitted");

        let record = NewTransaction {
            user_id,
            tx_hash: txid.clone(),
            direction: Direction::Outgoing,
            from_address: wallet.address.clone(),
            to_address: target.to_string(),
            amount,
            explorer_link: self.deps.chain.tx_link(&txid),
        };
        // The transfer is on chain either way; a missing log row must not turn it into a failure.
        if let Err(e) = self.deps.txlog.append(&record).await {
            error!(user_id, txid = %txid, error = %e, "transfer sent but not logged");
        }
        Ok(txid)
    }
}

fn offer_recreate(address: &str) -> Reply {
    Reply::send(text::wallet_exists(address)).with_row(vec![
        Button::callback("🔄 Create new", Action::RecreateWallet),
        Button::callback("Keep current", Action::KeepWallet),
    ])
}

/// Positive decimal with at most six fractional digits.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(Error::InvalidInput(format!("not a number: {raw}")));
    }
    let amount = Decimal::from_str(raw).map_err(|e| Error::InvalidInput(format!("{raw}: {e}")))?;
    to_base_units(amount)?;
    Ok(amount.normalize())
}
