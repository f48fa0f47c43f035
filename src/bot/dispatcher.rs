//! Update dispatcher - long-poll loop, per-user queues, delivery.

use super::telegram::{CallbackQuery, Message, TelegramClient, Update};
use super::TransferFlow;
use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Updates for different users run concurrently; updates for one user run in arrival order.
///
/// Each user with pending updates owns a queue and one worker task draining it. The worker
/// removes its queue once empty, so idle users hold no entry.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<TelegramClient>,
    flow: Arc<TransferFlow>,
    queues: Arc<DashMap<i64, mpsc::UnboundedSender<Update>>>,
}

impl Dispatcher {
    pub fn new(client: Arc<TelegramClient>, flow: Arc<TransferFlow>) -> Self {
        Self { client, flow, queues: Arc::new(DashMap::new()) }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("dispatcher started");
        let mut offset: Option<i64> = None;
        loop {
            let polled = tokio::select! {
                _ = shutdown.recv() => break,
                polled = self.client.get_updates(offset) => polled,
            };
            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.dispatch(update);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "getUpdates failed");
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        info!("dispatcher stopped");
        Ok(())
    }

    /// Queue an update behind earlier ones from the same user. Must run inside a tokio runtime.
    pub fn dispatch(&self, update: Update) {
        let Some(user_id) = sender_of(&update) else {
            debug!(update_id = update.update_id, "update without sender ignored");
            return;
        };
        // The entry guard is held while sending, so a worker cannot retire the queue in between.
        match self.queues.entry(user_id) {
            Entry::Occupied(mut entry) => {
                if let Err(mpsc::error::SendError(update)) = entry.get().send(update) {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let _ = tx.send(update);
                    *entry.get_mut() = tx;
                    self.spawn_worker(user_id, rx);
                }
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = tx.send(update);
                entry.insert(tx);
                self.spawn_worker(user_id, rx);
            }
        }
    }

    /// Users with updates queued or in flight.
    pub fn active_users(&self) -> usize { self.queues.len() }

    fn spawn_worker(&self, user_id: i64, mut rx: mpsc::UnboundedReceiver<Update>) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match rx.try_recv() {
                    Ok(update) => this.handle(update).await,
                    Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {
                        if this.queues.remove_if(&user_id, |_, _| rx.is_empty()).is_some() {
                            break;
                        }
                    }
                }
            }
        });
    }

    pub async fn handle(&self, update: Update) {
        if let Some(message) = update.message {
            self.on_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.on_callback(callback).await;
        }
    }

    async fn on_message(&self, message: Message) {
        let (Some(user), Some(text)) = (message.from.as_ref(), message.text.as_deref()) else {
            return;
        };

        if let Some(reply) = self.flow.handle_text(user.id, text).await {
            if let Err(e) = self.client.deliver(message.chat.id, None, &reply).await {
                warn!(user_id = user.id, error = %e, "reply failed");
            }
        }
    }

    async fn on_callback(&self, callback: CallbackQuery) {
        let user_id = callback.from.id;

        let outcome = match callback.data.as_deref() {
            Some(data) => self.flow.handle_button(user_id, data).await,
            None => Default::default(),
        };

        if let Some(reply) = &outcome.reply {
            // Messages too old to carry context: answer in the private chat.
            let (chat_id, message_id) = match &callback.message {
                Some(message) => (message.chat.id, Some(message.message_id)),
                None => (user_id, None),
            };
            if let Err(e) = self.client.deliver(chat_id, message_id, reply).await {
                warn!(user_id, error = %e, "reply failed");
            }
        }
        // Always answered, or the client keeps its loading spinner.
        if let Err(e) = self.client.answer_callback(&callback.id, outcome.alert.as_deref()).await {
            debug!(user_id, error = %e, "answerCallbackQuery failed");
        }
    }
}

fn sender_of(update: &Update) -> Option<i64> {
    if let Some(message) = &update.message {
        message.from.as_ref().map(|user| user.id)
    } else {
        update.callback_query.as_ref().map(|callback| callback.from.id)
    }
}
