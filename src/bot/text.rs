//! User-facing message texts (Telegram HTML parse mode).

use crate::balance::WalletSummary;
use crate::risk::RiskLabel;
use crate::storage::{Direction, TransactionRecord, Wallet};
use rust_decimal::Decimal;

/// Escape for HTML parse mode. Anything the user typed goes through here.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn wallet_created(wallet: &Wallet) -> String {
    format!(
        "✅ New wallet created!\n\n\
         <b>Address:</b> <code>{}</code>\n\n\
         <b>Mnemonic (keep it secret, it cannot be recovered):</b>\n<tg-spoiler>{}</tg-spoiler>",
        wallet.address,
        escape(wallet.mnemonic.expose())
    )
}

pub fn wallet_exists(address: &str) -> String {
    format!(
        "You already have a wallet:\n<code>{address}</code>\n\n\
         Create a new one? The old wallet will be deleted permanently."
    )
}

pub fn wallet_kept() -> &'static str { "Cancelled. Your current wallet is kept." }

pub fn no_wallet() -> &'static str { "You don't have a wallet yet. Send /start to create one." }

pub fn wallet_summary(summary: &WalletSummary, address_link: &str) -> String {
    let mut text = format!(
        "💼 <b>Your wallet</b>\n\n\
         <b>Address:</b> <a href=\"{address_link}\">{}</a>\n\
         <b>TRX:</b> {:.4}\n\
         <b>USDT:</b> {:.2}\n\
         <b>Energy:</b> {}\n\
         <b>Bandwidth:</b> {}",
        summary.address,
        summary.native_balance.round_dp(4),
        summary.token_balance.round_dp(2),
        summary.energy, summary.bandwidth
    );
    if summary.degraded {
        text.push_str("\n\n⚠️ Balances are temporarily unavailable.");
    } else if !summary.activated {
        text.push_str("\n\nThe address is not activated yet. It activates on the first incoming transfer.");
    }
    text
}

pub fn history(records: &[TransactionRecord]) -> String {
    if records.is_empty() {
        return "No transactions yet.".into();
    }
    let mut text = String::from("📜 <b>Recent transactions</b>\n");
    for r in records {
        let (arrow, counterparty) = match r.direction {
            Direction::Incoming => ("⬇️", &r.from_address),
            Direction::Outgoing => ("⬆️", &r.to_address),
        };
        text.push_str(&format!(
            "\n{arrow} {} USDT {} <code>{}</code> · <a href=\"{}\">tx</a>",
            r.amount,
            if r.direction == Direction::Incoming { "from" } else { "to" },
            escape(counterparty),
            r.explorer_link
        ));
    }
    text
}

pub fn app_link() -> &'static str { "Open the wallet app:" }

pub fn app_unavailable() -> &'static str { "The wallet app is not available right now." }

pub fn choose_action(target: &str) -> String {
    format!("Address <code>{}</code>\n\nWhat would you like to do?", escape(target))
}

pub fn ask_amount(target: &str) -> String {
    format!("Enter the USDT amount to send to <code>{}</code>:", escape(target))
}

pub fn invalid_amount() -> &'static str {
    "Please enter a positive number with at most 6 decimal places, e.g. 10.5"
}

pub fn confirm_transfer(target: &str, amount: Decimal) -> String {
    format!("Send <b>{amount} USDT</b> to <code>{}</code>?", escape(target))
}

pub fn transfer_cancelled() -> &'static str { "Transfer cancelled." }

pub fn transfer_sent(amount: Decimal, target: &str, tx_link: &str) -> String {
    format!(
        "✅ Sent <b>{amount} USDT</b> to <code>{}</code>\n<a href=\"{tx_link}\">View on explorer</a>",
        escape(target)
    )
}

pub fn insufficient_funds(requested: Decimal, available: Decimal) -> String {
    format!("❌ Insufficient funds: requested {requested} USDT, available {available} USDT.")
}

pub fn transfer_failed() -> &'static str { "❌ The transfer could not be completed. Please try again later." }

pub fn risk_result(target: &str, label: &RiskLabel) -> String {
    if label.is_unknown() {
        format!("🔎 Risk check for <code>{}</code>\n\nRisk level: <b>UNKNOWN</b> (service unavailable)", escape(target))
    } else {
        format!(
            "🔎 Risk check for <code>{}</code>\n\nRisk level: <b>{}</b>",
            escape(target),
            escape(label.as_str())
        )
    }
}

pub fn no_address_selected() -> &'static str { "Send an address first." }

pub fn cancelled() -> &'static str { "Cancelled." }

pub fn incoming(amount: Decimal, from: &str, label: &RiskLabel, tx_link: &str) -> String {
    format!(
        "💰 <b>Incoming transfer</b>\n\n\
         <b>Amount:</b> {amount} USDT\n\
         <b>From:</b> <code>{}</code>\n\
         <b>Sender risk:</b> {}\n\
         <a href=\"{tx_link}\">View on explorer</a>",
        escape(from),
        escape(label.as_str())
    )
}

pub fn internal_error() -> &'static str { "Something went wrong. Please try again later." }
