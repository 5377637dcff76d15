//! The completion trait implemented by remote clients and test doubles.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::Configuration;
use crate::error::CompletionError;
use crate::history::HistoryMessage;

/// Stream of cumulative response text.
///
/// Each item is the full text received so far, not the latest fragment,
/// so consumers can replace content instead of appending.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Everything needed for one completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The new user turn.
    pub prompt: String,
    /// Prior turns, oldest first, not including `prompt`.
    pub history: Vec<HistoryMessage>,
    /// Generation parameters.
    pub config: Configuration,
    /// Optional user display name used to personalise the system instruction.
    pub display_name: Option<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, history: Vec<HistoryMessage>, config: Configuration) -> Self {
        Self {
            prompt: prompt.into(),
            history,
            config,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }
}

/// A chat-completion backend.
///
/// Implementations are stateless apart from their own connection settings;
/// history and configuration travel with each request. Object-safe so the
/// engine can hold an `Arc<dyn Completion>`.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Single request/response. Returns the text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    /// Open a streaming request.
    ///
    /// Fails with [`CompletionError::Transport`] if the request cannot be
    /// started. Dropping the returned stream aborts the transfer.
    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError>;

    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Drive [`stream`](Completion::stream) to the end, handing every
    /// cumulative text to `on_delta`.
    ///
    /// Stops early without error when `cancel` fires; the text received up
    /// to that point is returned and no callback runs after cancellation.
    async fn stream_complete(
        &self,
        request: CompletionRequest,
        cancel: &CancelToken,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, CompletionError> {
        let mut stream = self.stream(request).await?;
        let mut text = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("stream cancelled after {} chars", text.len());
                    break;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(latest)) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    text = latest;
                    on_delta(&text);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        Ok(text)
    }
}
