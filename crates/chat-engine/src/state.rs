//! Engine state owned behind the engine's lock.

use std::collections::HashMap;

use chat_core::{
    CancelToken, Configuration, Conversation, ConversationId, ConversationsRecord, MessageId,
    ShareId,
};
use tracing::info;

use crate::events::{EngineEvent, Subscribers};

/// The completion request currently streaming into a conversation.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub request_id: u64,
    pub message_id: MessageId,
    pub cancel: CancelToken,
}

#[derive(Debug)]
pub(crate) struct EngineState {
    /// Never empty.
    pub conversations: Vec<Conversation>,
    pub active_id: ConversationId,
    pub loading: HashMap<ConversationId, InFlight>,
    pub last_error: Option<String>,
    pub config: Configuration,
    pub display_name: Option<String>,
    /// Shared snapshot being viewed instead of the active conversation.
    pub shared_view: Option<ShareId>,
    pub subscribers: Subscribers,
}

impl EngineState {
    /// Rebuild state from stored records.
    ///
    /// Returns the state and whether the stored conversation record needed
    /// repair (empty collection, stale active id or interrupted replies).
    pub fn restore(
        record: Option<ConversationsRecord>,
        config: Configuration,
        display_name: Option<String>,
    ) -> (Self, bool) {
        let mut repaired = false;
        let (mut conversations, stored_active) = match record {
            Some(record) => (record.conversations, record.active_id),
            None => (Vec::new(), None),
        };

        if conversations.is_empty() {
            conversations.push(Conversation::new());
            repaired = true;
        }

        let settled: usize = conversations.iter_mut().map(|c| c.settle_pending()).sum();
        if settled > 0 {
            info!("Settled {} message(s) left pending by a previous session", settled);
            repaired = true;
        }

        let active_id = match stored_active.filter(|id| conversations.iter().any(|c| &c.id == id))
        {
            Some(id) => id,
            None => {
                repaired = true;
                conversations[0].id.clone()
            }
        };

        let state = Self {
            conversations,
            active_id,
            loading: HashMap::new(),
            last_error: None,
            config,
            display_name,
            shared_view: None,
            subscribers: Subscribers::default(),
        };
        (state, repaired)
    }

    pub fn index_of(&self, id: &ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| &c.id == id)
    }

    /// Index of the active conversation, falling back to the first one.
    pub fn active_index(&self) -> usize {
        self.index_of(&self.active_id).unwrap_or(0)
    }

    pub fn active(&self) -> &Conversation {
        &self.conversations[self.active_index()]
    }

    pub fn active_mut(&mut self) -> &mut Conversation {
        let index = self.active_index();
        &mut self.conversations[index]
    }

    /// Id of the active conversation after fallback.
    pub fn resolved_active_id(&self) -> ConversationId {
        self.active().id.clone()
    }

    pub fn conversation_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    /// Whether `request_id` is still the live request for a conversation.
    pub fn is_current(&self, id: &ConversationId, request_id: u64) -> bool {
        self.loading
            .get(id)
            .is_some_and(|flight| flight.request_id == request_id)
    }

    /// Cancel and forget the request streaming into a conversation.
    pub fn cancel_in_flight(&mut self, id: &ConversationId) -> Option<InFlight> {
        let flight = self.loading.remove(id)?;
        flight.cancel.cancel();
        self.emit(EngineEvent::LoadingChanged {
            conversation_id: id.clone(),
            loading: false,
        });
        Some(flight)
    }

    pub fn set_error(&mut self, error: Option<String>) {
        if self.last_error != error {
            self.last_error = error.clone();
            self.emit(EngineEvent::ErrorChanged(error));
        }
    }

    pub fn record(&self) -> ConversationsRecord {
        ConversationsRecord {
            conversations: self.conversations.clone(),
            active_id: Some(self.active_id.clone()),
        }
    }

    pub fn emit(&mut self, event: EngineEvent) {
        self.subscribers.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Message;

    fn conversation_with(messages: Vec<Message>) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.messages = messages;
        conversation
    }

    #[test]
    fn test_restore_empty_creates_conversation() {
        let (state, repaired) = EngineState::restore(None, Configuration::default(), None);
        assert!(repaired);
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.active_id, state.conversations[0].id);
    }

    #[test]
    fn test_restore_stale_active_id_falls_back_to_first() {
        let a = Conversation::new();
        let b = Conversation::new();
        let record = ConversationsRecord {
            conversations: vec![a.clone(), b],
            active_id: Some(ConversationId::new("gone")),
        };

        let (state, repaired) = EngineState::restore(Some(record), Configuration::default(), None);
        assert!(repaired);
        assert_eq!(state.active_id, a.id);
    }

    #[test]
    fn test_restore_settles_pending_messages() {
        let conversation =
            conversation_with(vec![Message::user("Hi"), Message::pending_assistant()]);
        let record = ConversationsRecord {
            active_id: Some(conversation.id.clone()),
            conversations: vec![conversation],
        };

        let (state, repaired) = EngineState::restore(Some(record), Configuration::default(), None);
        assert!(repaired);
        assert!(state.conversations[0].messages.iter().all(|m| !m.pending));
    }

    #[test]
    fn test_restore_clean_record_is_untouched() {
        let conversation = conversation_with(vec![Message::user("Hi"), Message::assistant("Hey")]);
        let record = ConversationsRecord {
            active_id: Some(conversation.id.clone()),
            conversations: vec![conversation.clone()],
        };

        let (state, repaired) =
            EngineState::restore(Some(record), Configuration::default(), Some("Ada".into()));
        assert!(!repaired);
        assert_eq!(state.conversations, vec![conversation]);
        assert_eq!(state.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_active_falls_back_when_id_is_stale() {
        let (mut state, _) = EngineState::restore(None, Configuration::default(), None);
        state.active_id = ConversationId::new("gone");
        assert_eq!(state.resolved_active_id(), state.conversations[0].id);
    }

    #[test]
    fn test_cancel_in_flight() {
        let (mut state, _) = EngineState::restore(None, Configuration::default(), None);
        let id = state.active_id.clone();
        let cancel = CancelToken::new();
        state.loading.insert(
            id.clone(),
            InFlight {
                request_id: 7,
                message_id: MessageId::new("m"),
                cancel: cancel.clone(),
            },
        );

        assert!(state.is_current(&id, 7));
        assert!(!state.is_current(&id, 8));

        let flight = state.cancel_in_flight(&id).unwrap();
        assert_eq!(flight.request_id, 7);
        assert!(cancel.is_cancelled());
        assert!(state.loading.is_empty());
        assert!(state.cancel_in_flight(&id).is_none());
    }
}
