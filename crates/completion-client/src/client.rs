//! HTTP client for the chat-completion endpoint.

use chat_core::{
    async_trait, hash_prompt, personalize, Completion, CompletionError, CompletionRequest,
    DeltaStream,
};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Error as EventSourceError, Event, RequestBuilderExt};
use tracing::{debug, info, warn};

use crate::api_types::{ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::CompletionConfig;
use crate::sse::SseDeltaStream;

/// Client for an OpenAI-compatible chat-completion endpoint.
///
/// Stateless apart from its connection settings: conversation history and
/// generation parameters travel with every [`CompletionRequest`].
#[derive(Clone)]
pub struct CompletionClient {
    http: Client,
    config: CompletionConfig,
    system_prompt_hash: String,
}

impl CompletionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        // No overall timeout: streamed responses are long-lived. Non-streaming
        // requests set their own.
        let http = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                CompletionError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let system_prompt_hash = hash_prompt(&config.system_prompt);
        info!(
            "CompletionClient initialized for {} (system prompt fingerprint: {})",
            config.completions_url(),
            system_prompt_hash
        );

        Ok(Self {
            http,
            config,
            system_prompt_hash,
        })
    }

    /// Create a client from environment variables.
    ///
    /// See [`CompletionConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, CompletionError> {
        Self::new(CompletionConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Fingerprint of the base system prompt.
    pub fn system_prompt_hash(&self) -> &str {
        &self.system_prompt_hash
    }

    /// Build the messages array: system instruction, history, then the prompt.
    pub fn build_messages(&self, request: &CompletionRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);

        messages.push(ChatMessage::system(personalize(
            &self.config.system_prompt,
            request.display_name.as_deref(),
        )));
        messages.extend(request.history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(request.prompt.clone()));

        messages
    }

    /// Build the request body.
    pub fn build_request(&self, request: &CompletionRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.config.model.clone(),
            messages: self.build_messages(request),
            temperature: request.config.temperature,
            max_tokens: request.config.max_output_tokens,
            top_p: request.config.top_p,
            stream,
        }
    }

    /// Build the POST for a request body.
    fn post(&self, body: &ChatCompletionRequest) -> RequestBuilder {
        let url = self.config.completions_url();
        debug!(
            "Sending request to {} (model: {}, messages: {}, stream: {})",
            url,
            body.model,
            body.messages.len(),
            body.stream
        );

        let builder = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body);

        // Streamed responses are long-lived; only the connect timeout applies.
        if body.stream {
            builder
        } else {
            builder.timeout(self.config.request_timeout)
        }
    }

    /// POST a non-streaming request body and check the status.
    async fn send(&self, body: &ChatCompletionRequest) -> Result<Response, CompletionError> {
        let response = self
            .post(body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        Ok(response)
    }
}

/// Transport error for a non-success response, using the API error body when present.
fn status_error(status: StatusCode, body: &str) -> CompletionError {
    match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => match api_error.error.error_type {
            Some(error_type) => CompletionError::Transport(format!(
                "API error ({}, {}): {}",
                status.as_u16(),
                error_type,
                api_error.error.message
            )),
            None => CompletionError::Transport(format!(
                "API error ({}): {}",
                status.as_u16(),
                api_error.error.message
            )),
        },
        Err(_) => CompletionError::Transport(format!("API error ({}): {}", status.as_u16(), body)),
    }
}

/// Map a failure to open an event stream.
async fn open_error(error: EventSourceError) -> CompletionError {
    match error {
        EventSourceError::InvalidStatusCode(status, response) => {
            let error_text = response.text().await.unwrap_or_default();
            status_error(status, &error_text)
        }
        EventSourceError::InvalidContentType(content_type, _) => CompletionError::Transport(
            format!("Unexpected content type for stream: {:?}", content_type),
        ),
        other => CompletionError::Transport(format!("Failed to open stream: {}", other)),
    }
}

#[async_trait]
impl Completion for CompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;

        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(format!("Failed to read response: {}", e)))?;

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Parse(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &completion.usage {
            debug!(
                "Token usage - prompt: {}, completion: {}, total: {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Parse("Response has no message content".to_string()))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        let body = self.build_request(&request, true);
        let mut source = self
            .post(&body)
            .eventsource()
            .map_err(|e| CompletionError::Transport(format!("Failed to build request: {}", e)))?;
        source.set_retry_policy(Box::new(Never));

        // The first event is Open once the status and content type check out.
        let first = match source.next().await {
            Some(Ok(Event::Open)) => None,
            Some(Ok(event)) => Some(Ok(event)),
            Some(Err(e)) => {
                source.close();
                let error = open_error(e).await;
                warn!("Completion stream failed to open: {}", error);
                return Err(error);
            }
            None => {
                return Err(CompletionError::Transport(
                    "Stream closed before opening".to_string(),
                ))
            }
        };

        let events = futures::stream::iter(first).chain(source);
        Ok(Box::pin(SseDeltaStream::new(events)))
    }

    fn name(&self) -> &str {
        "CompletionClient"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{Configuration, HistoryMessage};

    fn client() -> CompletionClient {
        let config = CompletionConfig::builder()
            .api_key("test-key")
            .system_prompt("Be helpful.")
            .build();
        CompletionClient::new(config).unwrap()
    }

    #[test]
    fn test_build_messages_order() {
        let request = CompletionRequest::new(
            "How are you?",
            vec![
                HistoryMessage::user("Hello"),
                HistoryMessage::assistant("Hi there!"),
            ],
            Configuration::default(),
        );

        let messages = client().build_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::system("Be helpful."));
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "Hello");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3], ChatMessage::user("How are you?"));
    }

    #[test]
    fn test_build_messages_personalized() {
        let request = CompletionRequest::new("Hi", Vec::new(), Configuration::default())
            .with_display_name(Some("Ada".to_string()));

        let messages = client().build_messages(&request);
        assert!(messages[0].content.starts_with("Be helpful."));
        assert!(messages[0].content.contains("Ada"));
    }

    #[test]
    fn test_build_request_uses_configuration() {
        let config = Configuration {
            model: "qwen/qwen3-32b".to_string(),
            temperature: 0.3,
            max_output_tokens: 512,
            top_p: 0.8,
        };
        let request = CompletionRequest::new("Hi", Vec::new(), config);

        let body = client().build_request(&request, true);
        assert_eq!(body.model, "qwen/qwen3-32b");
        assert_eq!(body.temperature, 0.3);
        assert_eq!(body.max_tokens, 512);
        assert_eq!(body.top_p, 0.8);
        assert!(body.stream);
    }

    #[test]
    fn test_client_name_and_fingerprint() {
        let client = client();
        assert_eq!(client.name(), "CompletionClient");
        assert_eq!(client.system_prompt_hash(), hash_prompt("Be helpful."));
    }
}
