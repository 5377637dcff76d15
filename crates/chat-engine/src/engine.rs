//! The conversation engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_core::{
    derive_title, history_from, validate_display_name, CancelToken, Completion, CompletionError,
    CompletionRequest, Configuration, ConfigurationPatch, Conversation, ConversationId, Message,
    MessageId, ShareId, SharedSnapshot,
};
use chat_store::PersistentStore;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::events::EngineEvent;
use crate::route::Route;
use crate::settings::EngineSettings;
use crate::state::{EngineState, InFlight};

/// User-facing error set when a completion fails.
pub const ERROR_MESSAGE: &str = "An error occurred, please try again.";

/// Content written into an assistant message whose completion failed.
pub const APOLOGY_MESSAGE: &str = "Sorry, there was a connection problem. Please try again.";

/// How a [`ChatEngine::send_message`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply streamed to the end.
    Completed,
    /// The request was cancelled; the reply keeps whatever text arrived.
    Stopped,
    /// The request failed; the reply holds the apology text.
    Failed,
    /// Nothing was sent.
    Skipped(SkipReason),
}

/// Why a send was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The conversation already has a request in flight.
    Busy,
    /// The message text is blank.
    BlankText,
    /// The regeneration target is not an assistant message of the active conversation.
    TargetNotFound,
    /// There is no assistant message to regenerate.
    NoAssistantMessage,
}

/// Address of a stored shared snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub share_id: ShareId,
    /// Absolute address, `<share base url>/share/<share id>`.
    pub address: String,
}

/// What an address resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// The active conversation, editable.
    Conversation(Conversation),
    /// A shared snapshot, read-only.
    Shared(SharedSnapshot),
}

/// Point-in-time copy of the engine state for polling hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub conversations: Vec<Conversation>,
    pub active_id: ConversationId,
    pub loading: Vec<ConversationId>,
    pub last_error: Option<String>,
    pub config: Configuration,
    pub display_name: Option<String>,
}

/// A send that passed validation and is registered as loading.
struct PreparedSend {
    conversation_id: ConversationId,
    message_id: MessageId,
    request_id: u64,
    cancel: CancelToken,
    request: CompletionRequest,
}

/// Owns the conversations and drives completions for them.
///
/// Cheap to clone; clones share state. State is mutated under a single lock
/// that is never held across an await, and every mutation of the
/// conversation collection is written through to the store.
#[derive(Clone)]
pub struct ChatEngine {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<EngineState>,
    store: PersistentStore,
    completion: Arc<dyn Completion>,
    settings: EngineSettings,
    /// Serializes store writes so the last write carries the latest state.
    writer: tokio::sync::Mutex<()>,
    next_request: AtomicU64,
}

impl ChatEngine {
    /// Restore the engine from the store.
    ///
    /// An empty or unreadable collection yields one fresh conversation, a
    /// stale active id falls back to the first conversation and replies
    /// interrupted by a previous session are settled.
    pub async fn load(
        store: PersistentStore,
        completion: Arc<dyn Completion>,
        settings: EngineSettings,
    ) -> Self {
        let record = store.load_conversations().await;
        let config = store.load_config().await;
        let display_name = store.load_display_name().await;
        let (state, repaired) = EngineState::restore(record, config, display_name);

        info!(
            "Chat engine loaded {} conversation(s) using {} (model: {})",
            state.conversations.len(),
            completion.name(),
            state.config.model
        );

        let engine = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                store,
                completion,
                settings,
                writer: tokio::sync::Mutex::new(()),
                next_request: AtomicU64::new(1),
            }),
        };

        if repaired {
            engine.persist().await;
        }
        engine
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn persist(&self) {
        let _writer = self.inner.writer.lock().await;
        let record = self.state().record();
        self.inner.store.save_conversations(&record).await;
    }

    // ---- conversation management ----

    /// Create an empty conversation at the top of the list and activate it.
    pub async fn new_conversation(&self) -> ConversationId {
        let id = {
            let mut state = self.state();
            let conversation = Conversation::new();
            let id = conversation.id.clone();
            state.conversations.insert(0, conversation);
            state.active_id = id.clone();
            state.shared_view = None;
            state.set_error(None);
            state.emit(EngineEvent::ConversationsChanged);
            state.emit(EngineEvent::ActiveChanged(id.clone()));
            id
        };

        info!("Created conversation {}", id);
        self.persist().await;
        id
    }

    /// Activate a conversation.
    pub async fn select_conversation(&self, id: &ConversationId) -> Result<()> {
        {
            let mut state = self.state();
            if state.index_of(id).is_none() {
                return Err(EngineError::not_found("conversation", id.as_str()));
            }
            let changed = state.active_id != *id;
            state.active_id = id.clone();
            state.shared_view = None;
            state.set_error(None);
            if changed {
                state.emit(EngineEvent::ActiveChanged(id.clone()));
            }
        }

        self.persist().await;
        Ok(())
    }

    /// Delete a conversation, cancelling its request if one is in flight.
    ///
    /// Returns `false` if no such conversation exists. Deleting the last
    /// conversation leaves a fresh empty one.
    pub async fn delete_conversation(&self, id: &ConversationId) -> bool {
        {
            let mut state = self.state();
            let Some(index) = state.index_of(id) else {
                return false;
            };

            if state.cancel_in_flight(id).is_some() {
                debug!("Cancelled in-flight request of deleted conversation {}", id);
            }
            state.conversations.remove(index);

            if state.conversations.is_empty() {
                let fresh = Conversation::new();
                state.active_id = fresh.id.clone();
                state.conversations.push(fresh);
                let active = state.active_id.clone();
                state.emit(EngineEvent::ActiveChanged(active));
            } else if state.active_id == *id {
                state.active_id = state.conversations[0].id.clone();
                let active = state.active_id.clone();
                state.emit(EngineEvent::ActiveChanged(active));
            }
            state.emit(EngineEvent::ConversationsChanged);
        }

        info!("Deleted conversation {}", id);
        self.persist().await;
        true
    }

    /// Empty the active conversation and reset its title.
    pub async fn clear_conversation(&self) {
        {
            let mut state = self.state();
            let id = state.resolved_active_id();
            state.cancel_in_flight(&id);
            state.active_mut().clear();
            state.set_error(None);
            state.shared_view = None;
            state.emit(EngineEvent::ConversationsChanged);
        }

        self.persist().await;
    }

    // ---- sending ----

    /// Send a message in the active conversation and stream the reply.
    ///
    /// With `regenerate` set, the given assistant message is re-requested in
    /// place instead: it gets a new id and empty content, the prompt is the
    /// nearest preceding user message and the history is everything before
    /// that. Messages after the target are kept.
    ///
    /// Resolves once the reply has completed, failed or been stopped. The
    /// conversation is marked loading for exactly that long.
    pub async fn send_message(&self, text: &str, regenerate: Option<&MessageId>) -> SendOutcome {
        let prepared = match self.prepare_send(text, regenerate) {
            Ok(prepared) => prepared,
            Err(reason) => {
                debug!("Send skipped: {:?}", reason);
                return SendOutcome::Skipped(reason);
            }
        };

        let _loading = LoadingGuard {
            engine: self,
            conversation_id: prepared.conversation_id.clone(),
            request_id: prepared.request_id,
        };

        self.persist().await;
        let outcome = self.run_stream(&prepared).await;
        self.persist().await;

        info!(
            "Request {} in conversation {} finished: {:?}",
            prepared.request_id, prepared.conversation_id, outcome
        );
        outcome
    }

    /// Validate a send, update the message list and register it as loading.
    fn prepare_send(
        &self,
        text: &str,
        regenerate: Option<&MessageId>,
    ) -> std::result::Result<PreparedSend, SkipReason> {
        let mut state = self.state();
        let conversation_id = state.resolved_active_id();
        if state.loading.contains_key(&conversation_id) {
            return Err(SkipReason::Busy);
        }

        let trimmed = text.trim();
        let conversation = state.active_mut();

        let (prompt, history, message_id) = match regenerate {
            Some(target) => {
                let position = conversation
                    .position(target)
                    .filter(|&i| conversation.messages[i].is_assistant())
                    .ok_or(SkipReason::TargetNotFound)?;

                let (history_end, prompt) = match conversation.user_before(position) {
                    Some((index, user)) => (index, user.content.clone()),
                    None => (position, trimmed.to_string()),
                };
                if prompt.trim().is_empty() {
                    return Err(SkipReason::BlankText);
                }

                let history = history_from(&conversation.messages[..history_end]);
                let slot = &mut conversation.messages[position];
                slot.id = MessageId::generate();
                slot.content.clear();
                slot.pending = true;
                (prompt, history, slot.id.clone())
            }
            None => {
                if trimmed.is_empty() {
                    return Err(SkipReason::BlankText);
                }

                let history = history_from(&conversation.messages);
                if conversation.is_empty() {
                    conversation.title = derive_title(trimmed);
                }
                let reply = Message::pending_assistant();
                let message_id = reply.id.clone();
                conversation.messages.push(Message::user(trimmed));
                conversation.messages.push(reply);
                (trimmed.to_string(), history, message_id)
            }
        };
        conversation.touch();

        let request_id = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        state.loading.insert(
            conversation_id.clone(),
            InFlight {
                request_id,
                message_id: message_id.clone(),
                cancel: cancel.clone(),
            },
        );
        state.set_error(None);
        // Sending leaves any shared view for the conversation being replied in.
        state.shared_view = None;
        state.emit(EngineEvent::ConversationsChanged);
        state.emit(EngineEvent::MessageUpdated {
            conversation_id: conversation_id.clone(),
            message_id: message_id.clone(),
        });
        state.emit(EngineEvent::LoadingChanged {
            conversation_id: conversation_id.clone(),
            loading: true,
        });

        info!(
            "Sending request {} in conversation {} (history: {}, regenerate: {})",
            request_id,
            conversation_id,
            history.len(),
            regenerate.is_some()
        );

        let request = CompletionRequest::new(prompt, history, state.config.clone())
            .with_display_name(state.display_name.clone());

        Ok(PreparedSend {
            conversation_id,
            message_id,
            request_id,
            cancel,
            request,
        })
    }

    async fn run_stream(&self, prepared: &PreparedSend) -> SendOutcome {
        let cancel = &prepared.cancel;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.inner.completion.stream(prepared.request.clone()) => Some(result),
        };
        let mut stream = match opened {
            None => return SendOutcome::Stopped,
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return self.fail(prepared, e),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SendOutcome::Stopped,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(text)) => {
                    if !self.apply_delta(prepared, &text) {
                        return SendOutcome::Stopped;
                    }
                    self.persist().await;
                }
                Some(Err(e)) => return self.fail(prepared, e),
                None => return self.finish(prepared),
            }
        }
    }

    /// Replace the pending reply's content with the latest cumulative text.
    ///
    /// Returns `false` once the request has been cancelled or superseded.
    fn apply_delta(&self, prepared: &PreparedSend, text: &str) -> bool {
        let mut state = self.state();
        if prepared.cancel.is_cancelled()
            || !state.is_current(&prepared.conversation_id, prepared.request_id)
        {
            return false;
        }

        let Some(conversation) = state.conversation_mut(&prepared.conversation_id) else {
            return false;
        };
        let Some(message) = conversation.message_mut(&prepared.message_id) else {
            return false;
        };
        if !message.pending {
            return false;
        }
        message.content = text.to_string();
        conversation.touch();

        debug!(
            "Delta for {} in conversation {} ({} chars)",
            prepared.message_id,
            prepared.conversation_id,
            text.len()
        );
        state.emit(EngineEvent::MessageUpdated {
            conversation_id: prepared.conversation_id.clone(),
            message_id: prepared.message_id.clone(),
        });
        true
    }

    fn finish(&self, prepared: &PreparedSend) -> SendOutcome {
        let mut state = self.state();
        if prepared.cancel.is_cancelled()
            || !state.is_current(&prepared.conversation_id, prepared.request_id)
        {
            return SendOutcome::Stopped;
        }

        if let Some(conversation) = state.conversation_mut(&prepared.conversation_id) {
            if let Some(message) = conversation.message_mut(&prepared.message_id) {
                message.pending = false;
            }
            conversation.touch();
        }
        state.emit(EngineEvent::MessageUpdated {
            conversation_id: prepared.conversation_id.clone(),
            message_id: prepared.message_id.clone(),
        });
        SendOutcome::Completed
    }

    fn fail(&self, prepared: &PreparedSend, error: CompletionError) -> SendOutcome {
        warn!(
            "Completion failed in conversation {}: {}",
            prepared.conversation_id, error
        );

        let mut state = self.state();
        if prepared.cancel.is_cancelled()
            || !state.is_current(&prepared.conversation_id, prepared.request_id)
        {
            return SendOutcome::Stopped;
        }

        if let Some(conversation) = state.conversation_mut(&prepared.conversation_id) {
            if let Some(message) = conversation.message_mut(&prepared.message_id) {
                message.content = APOLOGY_MESSAGE.to_string();
                message.pending = false;
            }
            conversation.touch();
        }
        state.set_error(Some(ERROR_MESSAGE.to_string()));
        state.emit(EngineEvent::MessageUpdated {
            conversation_id: prepared.conversation_id.clone(),
            message_id: prepared.message_id.clone(),
        });
        SendOutcome::Failed
    }

    /// Cancel the active conversation's request.
    ///
    /// The reply keeps the text received so far and stops being pending.
    /// Returns `false` if nothing was in flight.
    pub async fn stop_generating(&self) -> bool {
        let stopped = {
            let mut state = self.state();
            let id = state.resolved_active_id();
            let flight = state.cancel_in_flight(&id);

            let settled = state.active_mut().settle_pending();
            if let Some(flight) = &flight {
                state.emit(EngineEvent::MessageUpdated {
                    conversation_id: id.clone(),
                    message_id: flight.message_id.clone(),
                });
            }
            if flight.is_some() || settled > 0 {
                info!("Stopped generating in conversation {}", id);
            }
            flight.is_some() || settled > 0
        };

        if stopped {
            self.persist().await;
        }
        stopped
    }

    /// Re-request the last assistant message of the active conversation.
    pub async fn regenerate(&self) -> SendOutcome {
        let target = {
            let state = self.state();
            let conversation = state.active();
            let target = conversation.last_assistant().map(|reply| {
                let prompt = conversation
                    .position(&reply.id)
                    .and_then(|index| conversation.user_before(index))
                    .map(|(_, user)| user.content.clone())
                    .unwrap_or_default();
                (reply.id.clone(), prompt)
            });
            target
        };

        match target {
            Some((message_id, prompt)) => self.send_message(&prompt, Some(&message_id)).await,
            None => SendOutcome::Skipped(SkipReason::NoAssistantMessage),
        }
    }

    // ---- settings ----

    /// Shallow-merge generation parameters. Applies from the next send.
    pub async fn update_configuration(&self, patch: ConfigurationPatch) -> Configuration {
        let _writer = self.inner.writer.lock().await;
        let config = {
            let mut state = self.state();
            state.config.apply(patch);
            let config = state.config.clone();
            state.emit(EngineEvent::ConfigurationChanged(config.clone()));
            config
        };

        info!(
            "Configuration updated (model: {}, temperature: {}, max tokens: {}, top-p: {})",
            config.model, config.temperature, config.max_output_tokens, config.top_p
        );
        self.inner.store.save_config(&config).await;
        config
    }

    /// Validate and store the user's display name.
    pub async fn set_display_name(&self, name: &str) -> Result<String> {
        let name = validate_display_name(name).map_err(|e| EngineError::Validation(e.to_string()))?;

        let _writer = self.inner.writer.lock().await;
        {
            let mut state = self.state();
            state.display_name = Some(name.clone());
            state.emit(EngineEvent::DisplayNameChanged(Some(name.clone())));
        }

        self.inner.store.save_display_name(&name).await;
        Ok(name)
    }

    pub async fn clear_display_name(&self) {
        let _writer = self.inner.writer.lock().await;
        {
            let mut state = self.state();
            state.display_name = None;
            state.emit(EngineEvent::DisplayNameChanged(None));
        }

        self.inner.store.clear_display_name().await;
    }

    // ---- sharing ----

    /// Store a snapshot of the active conversation and return its address.
    ///
    /// Fails with [`EngineError::Validation`] if the conversation has no
    /// messages. Later edits to the conversation do not reach the snapshot.
    pub async fn share_active_conversation(&self) -> Result<ShareLink> {
        let (conversation_id, snapshot) = {
            let state = self.state();
            let conversation = state.active();
            if conversation.is_empty() {
                return Err(EngineError::Validation(
                    "cannot share an empty conversation".to_string(),
                ));
            }
            let mut snapshot = SharedSnapshot::capture(conversation);
            for message in snapshot.messages.iter_mut() {
                message.pending = false;
            }
            (conversation.id.clone(), snapshot)
        };

        if !self.inner.store.put_share(&snapshot).await {
            return Err(EngineError::Storage(format!(
                "shared conversation {} was not saved",
                snapshot.share_id
            )));
        }

        let path = Route::Shared(snapshot.share_id.clone()).path();
        let link = ShareLink {
            address: self.inner.settings.address_for(&path),
            share_id: snapshot.share_id,
        };

        info!(
            "Shared conversation {} as {} ({} messages)",
            conversation_id,
            link.share_id,
            snapshot.messages.len()
        );
        Ok(link)
    }

    /// Look up a shared snapshot.
    pub async fn resolve_shared_conversation(&self, share_id: &ShareId) -> Result<SharedSnapshot> {
        self.inner
            .store
            .get_share(share_id)
            .await
            .ok_or_else(|| EngineError::not_found("shared conversation", share_id.as_str()))
    }

    // ---- addresses ----

    /// The route currently shown.
    pub fn current_route(&self) -> Route {
        let state = self.state();
        match &state.shared_view {
            Some(share_id) => Route::Shared(share_id.clone()),
            None => Route::Conversation(state.resolved_active_id()),
        }
    }

    /// Path of the current route, e.g. `/c/<id>`.
    pub fn current_address(&self) -> String {
        self.current_route().path()
    }

    /// Resynchronise the engine with an address, as on back/forward
    /// navigation. Never issues a completion request.
    ///
    /// Unknown conversation and share ids fail with
    /// [`EngineError::NotFound`] and leave the state unchanged.
    pub async fn navigate(&self, address: &str) -> Result<View> {
        let route = Route::parse(address)
            .ok_or_else(|| EngineError::Validation(format!("unrecognized address: {}", address)))?;
        debug!("Navigating to {}", route);

        match route {
            Route::Home => {
                self.state().shared_view = None;
                Ok(View::Conversation(self.active_conversation()))
            }
            Route::Conversation(id) => {
                self.select_conversation(&id).await?;
                Ok(View::Conversation(self.active_conversation()))
            }
            Route::Shared(share_id) => {
                let snapshot = self.resolve_shared_conversation(&share_id).await?;
                self.state().shared_view = Some(share_id);
                Ok(View::Shared(snapshot))
            }
        }
    }

    // ---- observation ----

    /// Receive an [`EngineEvent`] for every later state change.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        self.state().subscribers.subscribe()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.state();
        EngineSnapshot {
            conversations: state.conversations.clone(),
            active_id: state.resolved_active_id(),
            loading: state.loading.keys().cloned().collect(),
            last_error: state.last_error.clone(),
            config: state.config.clone(),
            display_name: state.display_name.clone(),
        }
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state().conversations.clone()
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        let state = self.state();
        state.index_of(id).map(|index| state.conversations[index].clone())
    }

    pub fn active_id(&self) -> ConversationId {
        self.state().resolved_active_id()
    }

    pub fn active_conversation(&self) -> Conversation {
        self.state().active().clone()
    }

    pub fn is_loading(&self, id: &ConversationId) -> bool {
        self.state().loading.contains_key(id)
    }

    /// Whether the active conversation is waiting on a reply.
    pub fn is_active_loading(&self) -> bool {
        let state = self.state();
        state.loading.contains_key(&state.resolved_active_id())
    }

    pub fn loading_ids(&self) -> Vec<ConversationId> {
        self.state().loading.keys().cloned().collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn config(&self) -> Configuration {
        self.state().config.clone()
    }

    pub fn display_name(&self) -> Option<String> {
        self.state().display_name.clone()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }
}

/// Clears a request's loading entry on every exit path of a send,
/// including the send future being dropped.
struct LoadingGuard<'a> {
    engine: &'a ChatEngine,
    conversation_id: ConversationId,
    request_id: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.state();
        if !state.is_current(&self.conversation_id, self.request_id) {
            return;
        }

        let Some(flight) = state.loading.remove(&self.conversation_id) else {
            return;
        };
        // Only reachable with the reply still pending if the send was abandoned.
        if let Some(conversation) = state.conversation_mut(&self.conversation_id) {
            if let Some(message) = conversation.message_mut(&flight.message_id) {
                message.pending = false;
            }
        }
        state.emit(EngineEvent::LoadingChanged {
            conversation_id: self.conversation_id.clone(),
            loading: false,
        });
    }
}
