//! Gated completion - holds a stream open until released.

use std::sync::Arc;

use chat_core::{async_trait, Completion, CompletionError, CompletionRequest, DeltaStream};
use futures::stream;
use tokio::sync::{watch, Notify};

use crate::scripted::{cumulative, RequestLog};

/// A backend that streams a first batch of fragments, then waits for
/// [`release`](GatedCompletion::release) before sending the rest.
///
/// Lets a test observe and act on a request that is still in flight
/// without relying on timing.
#[derive(Debug)]
pub struct GatedCompletion {
    before: Vec<String>,
    after: Vec<String>,
    gate: watch::Sender<bool>,
    opened: Arc<Notify>,
    log: RequestLog,
}

impl GatedCompletion {
    pub fn new<I, J, S, T>(before: I, after: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let (gate, _) = watch::channel(false);
        Self {
            before: before.into_iter().map(Into::into).collect(),
            after: after.into_iter().map(Into::into).collect(),
            gate,
            opened: Arc::new(Notify::new()),
            log: RequestLog::default(),
        }
    }

    /// Let every held stream, and every later one, run to completion.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Wait until a stream has reached the gate.
    ///
    /// Returns immediately if one got there since the last call.
    pub async fn wait_until_held(&self) {
        self.opened.notified().await;
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.log.all()
    }

    pub fn request_count(&self) -> usize {
        self.log.len()
    }
}

#[async_trait]
impl Completion for GatedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.log.record(&request);
        let _ = self.gate.subscribe().wait_for(|released| *released).await;
        Ok(format!("{}{}", self.before.concat(), self.after.concat()))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.log.record(&request);

        let mut fragments = self.before.clone();
        fragments.extend(self.after.iter().cloned());
        let frames = cumulative(&fragments);
        let hold_at = self.before.len();
        let gate = self.gate.subscribe();
        let opened = self.opened.clone();

        let frames = stream::unfold(
            (0usize, frames, gate, opened),
            move |(index, frames, mut gate, opened)| async move {
                if index == hold_at {
                    opened.notify_one();
                    let _ = gate.wait_for(|released| *released).await;
                }
                let frame = frames.get(index)?.clone();
                Some((Ok(frame), (index + 1, frames, gate, opened)))
            },
        );

        Ok(Box::pin(frames))
    }

    fn name(&self) -> &str {
        "GatedCompletion"
    }
}
