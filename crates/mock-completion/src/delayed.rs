//! Delayed completion - wraps another backend with artificial latency.

use std::time::Duration;

use chat_core::{async_trait, Completion, CompletionError, CompletionRequest, DeltaStream};
use futures::StreamExt;
use tokio::time::sleep;

/// A backend that waits before opening a stream and before every frame.
///
/// Useful for simulating network latency so a test can act while a
/// response is still in flight.
pub struct DelayedCompletion<C: Completion> {
    inner: C,
    delay: Duration,
}

impl<C: Completion> DelayedCompletion<C> {
    pub fn new(inner: C, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a backend with a delay in milliseconds.
    pub fn with_millis(inner: C, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Completion> Completion for DelayedCompletion<C> {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        sleep(self.delay).await;
        self.inner.complete(request).await
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        sleep(self.delay).await;
        let delay = self.delay;
        let inner = self.inner.stream(request).await?;

        Ok(inner
            .then(move |item| async move {
                sleep(delay).await;
                item
            })
            .boxed())
    }

    fn name(&self) -> &str {
        "DelayedCompletion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedCompletion;
    use chat_core::{CancelToken, Configuration};
    use std::time::Instant;

    fn request() -> CompletionRequest {
        CompletionRequest::new("Hi", Vec::new(), Configuration::default())
    }

    #[tokio::test]
    async fn test_delayed_stream() {
        let backend = DelayedCompletion::with_millis(ScriptedCompletion::new(["a", "b"]), 20);

        let start = Instant::now();
        let text = backend
            .stream_complete(request(), &CancelToken::new(), &mut |_: &str| {})
            .await
            .unwrap();

        assert_eq!(text, "ab");
        // One delay to open, one per frame.
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(backend.inner().request_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_delay_returns_partial() {
        let backend =
            DelayedCompletion::with_millis(ScriptedCompletion::new(["a", "b", "c"]), 100);
        let cancel = CancelToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        let text = backend
            .stream_complete(request(), &cancel, &mut |_: &str| {})
            .await
            .unwrap();

        assert_eq!(text, "a");
    }
}
