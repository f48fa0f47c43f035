//! Telegram Bot API over HTTPS: long polling plus the few methods the bot needs.

use super::{Button, Delivery, Notifier, Reply};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> { Self::with_api_url(token, DEFAULT_API_URL) }

    pub fn with_api_url(token: &str, api_url: &str) -> Result<Self> {
        let poll_timeout = Duration::from_secs(30);
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(15))
            .user_agent("custodia/0.1")
            .build()?;
        Ok(Self { http, base: format!("{}/bot{}", api_url.trim_end_matches('/'), token), poll_timeout })
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self { self.poll_timeout = timeout; self }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let resp: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        if !resp.ok {
            return Err(Error::External(format!(
                "telegram {method}: {}",
                resp.description.as_deref().unwrap_or("request failed")
            )));
        }
        resp.result.ok_or_else(|| Error::External(format!("telegram {method}: empty result")))
    }

    /// Long poll. `offset` is one past the last update already handled.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    pub async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<i64> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": reply.text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if !reply.keyboard.is_empty() {
            body["reply_markup"] = keyboard_markup(&reply.keyboard);
        }
        let sent: SentMessage = self.call("sendMessage", &body).await?;
        Ok(sent.message_id)
    }

    pub async fn edit_message(&self, chat_id: i64, message_id: i64, reply: &Reply) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": reply.text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if !reply.keyboard.is_empty() {
            body["reply_markup"] = keyboard_markup(&reply.keyboard);
        }
        // Returns the edited Message (or `true` for inline messages).
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    pub async fn answer_callback(&self, callback_id: &str, alert: Option<&str>) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = alert {
            body["text"] = json!(text);
            body["show_alert"] = json!(true);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Edit `message_id` when the reply asks for it, otherwise (or if the edit fails) send.
    pub async fn deliver(&self, chat_id: i64, message_id: Option<i64>, reply: &Reply) -> Result<()> {
        if let (Delivery::Edit, Some(message_id)) = (reply.delivery, message_id) {
            match self.edit_message(chat_id, message_id, reply).await {
                Ok(()) => return Ok(()),
                Err(e) => debug!(chat_id, message_id, error = %e, "edit failed, sending instead"),
            }
        }
        self.send_message(chat_id, reply).await.map(|_| ())
    }
}

fn keyboard_markup(rows: &[Vec<Button>]) -> Value {
    let rows: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match button {
                    Button::Callback { label, action } => json!({"text": label, "callback_data": action.as_str()}),
                    Button::WebApp { label, url } => json!({"text": label, "web_app": {"url": url}}),
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// In private chats the chat id is the user id.
#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, user_id: i64, reply: Reply) -> Result<()> {
        self.send_message(user_id, &reply).await.map(|_| ())
    }
}
