//! Failing completion - every request is rejected.

use chat_core::{async_trait, Completion, CompletionError, CompletionRequest, DeltaStream};

use crate::scripted::RequestLog;

/// A backend whose requests fail before any text arrives.
#[derive(Debug)]
pub struct FailingCompletion {
    error: CompletionError,
    log: RequestLog,
}

impl FailingCompletion {
    /// Fail with a transport error, as for a non-success HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(CompletionError::Transport(message.into()))
    }

    /// Fail with a parse error, as for a malformed response body.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(CompletionError::Parse(message.into()))
    }

    pub fn new(error: CompletionError) -> Self {
        Self {
            error,
            log: RequestLog::default(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.log.len()
    }
}

#[async_trait]
impl Completion for FailingCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.log.record(&request);
        Err(self.error.clone())
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        self.log.record(&request);
        Err(self.error.clone())
    }

    fn name(&self) -> &str {
        "FailingCompletion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Configuration;

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = FailingCompletion::transport("API error (500): boom");
        let request = CompletionRequest::new("Hi", Vec::new(), Configuration::default());

        assert!(matches!(
            backend.stream(request.clone()).await,
            Err(CompletionError::Transport(_))
        ));
        assert!(matches!(
            FailingCompletion::parse("bad json").complete(request).await,
            Err(CompletionError::Parse(_))
        ));
        assert_eq!(backend.request_count(), 1);
    }
}
