//! Conversation Memory
//!
//! Persistence of message history keyed by conversation id. The agent
//! hydrates from it before a run and saves back after a successful one.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::message::Message;

/// Memory store trait for persistence
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Ordered history for a conversation (empty if unknown)
    async fn get_history(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Replace the stored history for a conversation
    async fn save_history(&self, conversation_id: &str, history: &[Message]) -> Result<()>;

    /// Append one message
    async fn add_message(&self, conversation_id: &str, message: Message) -> Result<()>;

    /// Forget a conversation
    async fn clear_history(&self, conversation_id: &str) -> Result<()>;
}

/// In-memory store (for development/testing)
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversations = self.conversations.read().await;
        let history = conversations.get(conversation_id).cloned().unwrap_or_default();
        tracing::debug!(conversation_id, messages = history.len(), "Loaded history");
        Ok(history)
    }

    async fn save_history(&self, conversation_id: &str, history: &[Message]) -> Result<()> {
        tracing::debug!(conversation_id, messages = history.len(), "Saving history");
        self.conversations
            .write()
            .await
            .insert(conversation_id.to_string(), history.to_vec());
        Ok(())
    }

    async fn add_message(&self, conversation_id: &str, message: Message) -> Result<()> {
        self.conversations
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn clear_history(&self, conversation_id: &str) -> Result<()> {
        self.conversations.write().await.remove(conversation_id);
        Ok(())
    }
}
