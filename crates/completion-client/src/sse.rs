//! Server-sent event handling for streamed completions.

use std::pin::Pin;
use std::task::{Context, Poll};

use chat_core::CompletionError;
use futures::stream::Stream;
use reqwest_eventsource::{Error as EventSourceError, Event};
use tracing::{debug, warn};

use crate::api_types::StreamChunk;

/// Sentinel payload that ends a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Extract the text fragment from a frame payload.
///
/// Returns `None` for anything that is not a chunk with a string at
/// `choices[0].delta.content`; such frames are skipped by the caller.
pub fn parse_delta(data: &str) -> Option<String> {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk.into_fragment(),
        Err(e) => {
            debug!("Skipping malformed frame: {}", e);
            None
        }
    }
}

/// Turns server-sent events into cumulative response text.
///
/// Every message carrying a fragment yields the full text received so far.
/// Ends at `[DONE]` or when the body ends; any other event source error
/// yields one [`CompletionError::Transport`] and ends the stream.
pub struct SseDeltaStream<S> {
    events: S,
    text: String,
    finished: bool,
}

impl<S> SseDeltaStream<S> {
    pub fn new(events: S) -> Self {
        Self {
            events,
            text: String::new(),
            finished: false,
        }
    }
}

impl<S> Stream for SseDeltaStream<S>
where
    S: Stream<Item = Result<Event, EventSourceError>> + Unpin,
{
    type Item = Result<String, CompletionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.events).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => {
                    debug!("Completion stream opened");
                }
                Poll::Ready(Some(Ok(Event::Message(message)))) => {
                    if message.data.trim() == DONE_SENTINEL {
                        debug!("Stream finished after {} chars", this.text.len());
                        this.finished = true;
                        continue;
                    }
                    if let Some(fragment) = parse_delta(&message.data) {
                        this.text.push_str(&fragment);
                        return Poll::Ready(Some(Ok(this.text.clone())));
                    }
                }
                Poll::Ready(Some(Err(EventSourceError::StreamEnded))) | Poll::Ready(None) => {
                    debug!("Stream body ended after {} chars", this.text.len());
                    this.finished = true;
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!("Failed to read completion stream: {}", e);
                    this.finished = true;
                    return Poll::Ready(Some(Err(CompletionError::Transport(format!(
                        "failed to read stream: {}",
                        e
                    )))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
