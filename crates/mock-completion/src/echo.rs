//! Echo completion - replies with the prompt.

use chat_core::{async_trait, Completion, CompletionError, CompletionRequest, DeltaStream};

use crate::scripted::{cumulative, RequestLog};

/// A backend that echoes the prompt back, one word per frame.
///
/// Useful for checking which prompt reached the backend.
#[derive(Debug, Default)]
pub struct EchoCompletion {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
    log: RequestLog,
}

impl EchoCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Example
    ///
    /// ```rust
    /// use mock_completion::EchoCompletion;
    ///
    /// let backend = EchoCompletion::with_prefix("Echo: ");
    /// // Will respond with "Echo: <prompt>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            log: RequestLog::default(),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.log.all()
    }

    fn reply(&self, request: &CompletionRequest) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, request.prompt),
            None => request.prompt.clone(),
        }
    }
}

/// Split text into word fragments, keeping the separating whitespace.
fn words(text: &str) -> Vec<&str> {
    text.split_inclusive(' ').collect()
}

#[async_trait]
impl Completion for EchoCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.log.record(&request);
        Ok(self.reply(&request))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.log.record(&request);
        let reply = self.reply(&request);
        let items: Vec<Result<String, CompletionError>> =
            cumulative(&words(&reply)).into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        "EchoCompletion"
    }
}
