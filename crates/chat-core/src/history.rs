//! Model-facing conversation history.

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// A single prior turn sent to the model as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl HistoryMessage {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for HistoryMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Convert stored messages into model context, preserving order.
pub fn history_from(messages: &[Message]) -> Vec<HistoryMessage> {
    messages.iter().map(HistoryMessage::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_from_preserves_order_and_roles() {
        let messages = vec![
            Message::user("Hello"),
            Message::assistant("Hi there!"),
            Message::user("How are you?"),
        ];

        let history = history_from(&messages);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], HistoryMessage::user("Hello"));
        assert_eq!(history[1], HistoryMessage::assistant("Hi there!"));
        assert_eq!(history[2].role, Role::User);
    }
}
