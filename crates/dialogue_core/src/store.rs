//! Conversation state storage
//!
//! The engine only talks to [`ConversationStore`]. The in-memory store keeps
//! state for the lifetime of the process; a durable store can be swapped in
//! to survive restarts.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::state::ConversationState;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the state for a user, `None` if nothing is stored.
    async fn load(&self, user_id: i64) -> Result<Option<ConversationState>>;

    /// Replace the state for a user.
    async fn save(&self, user_id: i64, state: ConversationState) -> Result<()>;
}

/// Process-local store keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    states: DashMap<i64, ConversationState>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the state of one user, as a process restart would.
    pub fn forget(&self, user_id: i64) {
        self.states.remove(&user_id);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: i64) -> Result<Option<ConversationState>> {
        Ok(self.states.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, user_id: i64, state: ConversationState) -> Result<()> {
        self.states.insert(user_id, state);
        Ok(())
    }
}
