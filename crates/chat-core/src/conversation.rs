//! Conversations, shared snapshots and the persisted session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MessageId, ShareId};
use crate::message::Message;

/// Title given to conversations that have no user message yet.
pub const DEFAULT_TITLE: &str = "New chat";

/// Number of characters of the first user message kept in a derived title.
pub const TITLE_MAX_CHARS: usize = 30;

/// A titled, ordered list of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation with the placeholder title.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::generate(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Find the index of a message by id.
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    /// Most recent assistant message, if any.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }

    /// Nearest user message strictly before `index`.
    pub fn user_before(&self, index: usize) -> Option<(usize, &Message)> {
        self.messages[..index.min(self.messages.len())]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| m.is_user())
    }

    /// Record a mutation of the message list.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Settle every message still marked pending. Returns how many changed.
    pub fn settle_pending(&mut self) -> usize {
        let mut settled = 0;
        for message in self.messages.iter_mut().filter(|m| m.pending) {
            message.pending = false;
            settled += 1;
        }
        if settled > 0 {
            self.touch();
        }
        settled
    }

    /// Empty the message list and restore the placeholder title.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.title = DEFAULT_TITLE.to_string();
        self.touch();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a conversation title from the first user message.
///
/// Keeps the first [`TITLE_MAX_CHARS`] characters of the trimmed text and
/// appends `...` when anything was cut.
pub fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

/// Immutable, independently addressable copy of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSnapshot {
    pub share_id: ShareId,
    pub title: String,
    pub messages: Vec<Message>,
    pub shared_at: DateTime<Utc>,
}

impl SharedSnapshot {
    /// Take a point-in-time copy of a conversation under a new share id.
    pub fn capture(conversation: &Conversation) -> Self {
        Self {
            share_id: ShareId::generate(),
            title: conversation.title.clone(),
            messages: conversation.messages.clone(),
            shared_at: Utc::now(),
        }
    }
}

/// What gets persisted for the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsRecord {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<ConversationId>,
}
