//! Conversation state - per user, in memory, behind a swappable store.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Where a user is in the transfer flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    /// An address was typed; waiting for "send" or "check risk".
    AddressEntered { target: String },
    AwaitingAmount { target: String },
    AwaitingConfirmation { target: String, amount: Decimal },
}

impl ConversationState {
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AddressEntered { target } | Self::AwaitingAmount { target } | Self::AwaitingConfirmation { target, .. } => Some(target),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AddressEntered { .. } => "address_entered",
            Self::AwaitingAmount { .. } => "awaiting_amount",
            Self::AwaitingConfirmation { .. } => "awaiting_confirmation",
        }
    }
}

/// Keyed by user id. A distributed implementation can replace the in-memory one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: i64) -> ConversationState;
    async fn set(&self, user_id: i64, state: ConversationState);
    async fn clear(&self, user_id: i64);
}

#[derive(Default)]
pub struct MemorySessionStore {
    states: RwLock<HashMap<i64, ConversationState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.states.read().await.len() }
    pub async fn is_empty(&self) -> bool { self.states.read().await.is_empty() }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: i64) -> ConversationState {
        self.states.read().await.get(&user_id).cloned().unwrap_or_default()
    }

    async fn set(&self, user_id: i64, state: ConversationState) {
        let mut states = self.states.write().await;
        if state == ConversationState::Idle {
            states.remove(&user_id);
        } else {
            states.insert(user_id, state);
        }
    }

    async fn clear(&self, user_id: i64) {
        self.states.write().await.remove(&user_id);
    }
}
