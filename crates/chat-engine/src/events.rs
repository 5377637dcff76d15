//! Change notifications for hosts that re-render on engine updates.

use chat_core::{Configuration, ConversationId, MessageId};
use tokio::sync::mpsc;

/// A change to engine state.
///
/// Events say what changed, not the new value in full; read the current
/// state through the engine accessors.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A conversation was created, deleted, cleared or retitled.
    ConversationsChanged,
    /// A different conversation became active.
    ActiveChanged(ConversationId),
    /// A message was added, streamed into, settled or replaced.
    MessageUpdated {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    /// A conversation started or stopped waiting on a completion.
    LoadingChanged {
        conversation_id: ConversationId,
        loading: bool,
    },
    /// The user-facing error was set or cleared.
    ErrorChanged(Option<String>),
    /// Generation parameters changed.
    ConfigurationChanged(Configuration),
    /// The display name was set or cleared.
    DisplayNameChanged(Option<String>),
}

/// Fan-out of events to every live subscriber.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<mpsc::UnboundedSender<EngineEvent>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Deliver an event, dropping subscribers whose receiver is gone.
    pub(crate) fn emit(&mut self, event: EngineEvent) {
        if self.senders.is_empty() {
            return;
        }
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
