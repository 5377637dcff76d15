//! Scripted completion - replays a fixed list of fragments.

use std::sync::{Mutex, PoisonError};

use chat_core::{async_trait, Completion, CompletionError, CompletionRequest, DeltaStream};

/// Turn fragments into the cumulative texts a stream reports.
pub fn cumulative<S: AsRef<str>>(fragments: &[S]) -> Vec<String> {
    let mut text = String::new();
    fragments
        .iter()
        .map(|fragment| {
            text.push_str(fragment.as_ref());
            text.clone()
        })
        .collect()
}

/// Every request a mock backend has seen, in arrival order.
#[derive(Debug, Default)]
pub struct RequestLog {
    requests: Mutex<Vec<CompletionRequest>>,
}

impl RequestLog {
    pub fn record(&self, request: &CompletionRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
    }

    pub fn all(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

/// A backend that streams the same fragments for every request.
///
/// Optionally ends the stream with a transport error after the fragments,
/// to simulate a connection dropped mid-response.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    fragments: Vec<String>,
    fail_after: Option<String>,
    log: RequestLog,
}

impl ScriptedCompletion {
    /// Create a backend that streams `fragments` one frame each.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_completion::ScriptedCompletion;
    ///
    /// let backend = ScriptedCompletion::new(["H", "e", "llo"]);
    /// // Streams "H", "He", "Hello"
    /// ```
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            fail_after: None,
            log: RequestLog::default(),
        }
    }

    /// End every stream with a transport error carrying `message`.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.fail_after = Some(message.into());
        self
    }

    /// Full text of a completed response.
    pub fn full_text(&self) -> String {
        self.fragments.concat()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.log.all()
    }

    pub fn request_count(&self) -> usize {
        self.log.len()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.log.record(&request);
        match &self.fail_after {
            Some(message) => Err(CompletionError::Transport(message.clone())),
            None => Ok(self.full_text()),
        }
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.log.record(&request);

        let mut items: Vec<Result<String, CompletionError>> =
            cumulative(&self.fragments).into_iter().map(Ok).collect();
        if let Some(message) = &self.fail_after {
            items.push(Err(CompletionError::Transport(message.clone())));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        "ScriptedCompletion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{CancelToken, Configuration};
    use futures::StreamExt;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest::new(prompt, Vec::new(), Configuration::default())
    }

    #[test]
    fn test_cumulative() {
        assert_eq!(cumulative(&["H", "e", "llo"]), vec!["H", "He", "Hello"]);
        assert!(cumulative::<&str>(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let backend = ScriptedCompletion::new(["H", "e", "llo"]);
        let items: Vec<String> = backend
            .stream(request("Hi"))
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(items, vec!["H", "He", "Hello"]);
        assert_eq!(backend.request_count(), 1);
        assert_eq!(backend.requests()[0].prompt, "Hi");
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = ScriptedCompletion::new(["Par"]).then_fail("connection reset");

        let mut seen = Vec::new();
        let result = backend
            .stream_complete(request("Hi"), &CancelToken::new(), &mut |t: &str| {
                seen.push(t.to_string())
            })
            .await;

        assert!(matches!(result, Err(CompletionError::Transport(_))));
        assert_eq!(seen, vec!["Par"]);
        assert!(backend.complete(request("Hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_complete() {
        let backend = ScriptedCompletion::new(["Hel", "lo"]);
        assert_eq!(backend.complete(request("Hi")).await.unwrap(), "Hello");
        assert_eq!(backend.name(), "ScriptedCompletion");
    }
}
