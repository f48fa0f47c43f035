//! Bot - conversational front end
//!
//! ```text
//! Telegram getUpdates ──► Dispatcher ──(per-user queue)──► TransferFlow ──► Reply
//!                             │                               │
//!                             │                               ├── Ledger / TransactionLog
//!                             │                               ├── ChainReader / ChainSubmitter
//!                             │                               └── RiskCheck
//!                             ▼
//!                   sendMessage / editMessageText / answerCallbackQuery
//! ```
//!
//! The flow only produces [`Reply`] values (text + keyboard). Delivery belongs to
//! the Telegram client, which also implements [`Notifier`] for the chain observer.

pub mod dispatcher;
pub mod flow;
pub mod telegram;
pub mod text;

pub use dispatcher::Dispatcher;
pub use flow::{FlowDeps, TransferFlow};
pub use telegram::TelegramClient;

use crate::error::Result;
use async_trait::async_trait;

/// Button identifiers carried in callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SendToken,
    CheckRisk,
    ConfirmYes,
    ConfirmNo,
    RecreateWallet,
    KeepWallet,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SendToken => "send_usdt",
            Action::CheckRisk => "check_aml",
            Action::ConfirmYes => "confirm_yes",
            Action::ConfirmNo => "confirm_no",
            Action::RecreateWallet => "recreate_wallet",
            Action::KeepWallet => "cancel_wallet_action",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "send_usdt" => Some(Action::SendToken),
            "check_aml" => Some(Action::CheckRisk),
            "confirm_yes" => Some(Action::ConfirmYes),
            "confirm_no" => Some(Action::ConfirmNo),
            "recreate_wallet" => Some(Action::RecreateWallet),
            "cancel_wallet_action" => Some(Action::KeepWallet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Callback { label: String, action: Action },
    WebApp { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, action: Action) -> Self { Self::Callback { label: label.into(), action } }
    pub fn web_app(label: impl Into<String>, url: impl Into<String>) -> Self { Self::WebApp { label: label.into(), url: url.into() } }
}

/// `Edit` replaces the message that carried the pressed button; `Send` posts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Send,
    Edit,
}

/// Outbound message: HTML text plus an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
    pub delivery: Delivery,
}

impl Reply {
    pub fn send(text: impl Into<String>) -> Self { Self { text: text.into(), keyboard: Vec::new(), delivery: Delivery::Send } }
    pub fn edit(text: impl Into<String>) -> Self { Self { text: text.into(), keyboard: Vec::new(), delivery: Delivery::Edit } }
    pub fn with_row(mut self, row: Vec<Button>) -> Self { self.keyboard.push(row); self }

    pub fn has_action(&self, action: Action) -> bool {
        self.keyboard.iter().flatten().any(|b| matches!(b, Button::Callback { action: a, .. } if *a == action))
    }
}

/// Result of a button press: an optional message and an optional short toast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonOutcome {
    pub reply: Option<Reply>,
    pub alert: Option<String>,
}

impl ButtonOutcome {
    pub fn reply(reply: Reply) -> Self { Self { reply: Some(reply), alert: None } }
    pub fn alert(text: impl Into<String>) -> Self { Self { reply: None, alert: Some(text.into()) } }
    pub fn ignored() -> Self { Self::default() }
    pub fn is_ignored(&self) -> bool { self.reply.is_none() && self.alert.is_none() }
}

/// Pushes unsolicited messages (incoming transfer notices) to a user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, reply: Reply) -> Result<()>;
}

/// Writes notices to the log. Used when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: i64, reply: Reply) -> Result<()> {
        tracing::info!(user_id, text = %reply.text, "notice (no bot configured)");
        Ok(())
    }
}
