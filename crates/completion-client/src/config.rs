//! Configuration for the completion client.

use std::env;
use std::path::Path;
use std::time::Duration;

use chat_core::{CompletionError, DEFAULT_SYSTEM_PROMPT};

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1";

/// Default system prompt file name.
pub const DEFAULT_PROMPT_FILE: &str = "SYSTEM_PROMPT.md";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for [`CompletionClient`](crate::CompletionClient).
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// API base URL, or a full `/chat/completions` URL.
    pub api_url: String,

    /// Bearer credential.
    pub api_key: String,

    /// Base system instruction, personalised per request with the display name.
    pub system_prompt: String,

    /// Timeout for connecting, and for whole non-streaming requests.
    pub request_timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CompletionConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `GROQ_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `GROQ_API_URL` - API URL (default: https://api.groq.com/openai/v1)
    /// - `GROQ_SYSTEM_PROMPT` - System prompt (overrides prompt file)
    /// - `GROQ_PROMPT_FILE` - Path to system prompt file (default: SYSTEM_PROMPT.md)
    /// - `GROQ_REQUEST_TIMEOUT_SECS` - Request timeout (default: 120)
    ///
    /// System prompt priority:
    /// 1. `GROQ_SYSTEM_PROMPT` env var (if set)
    /// 2. Contents of prompt file (if exists)
    /// 3. The built-in default instruction
    pub fn from_env() -> Result<Self, CompletionError> {
        let api_key = env::var("GROQ_API_KEY")
            .map_err(|_| CompletionError::Configuration("GROQ_API_KEY not set".to_string()))?;

        let api_url = env::var("GROQ_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let system_prompt = if let Ok(prompt) = env::var("GROQ_SYSTEM_PROMPT") {
            prompt
        } else {
            let prompt_file =
                env::var("GROQ_PROMPT_FILE").unwrap_or_else(|_| DEFAULT_PROMPT_FILE.to_string());
            load_prompt_file(&prompt_file).unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
        };

        let request_timeout = env::var("GROQ_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Ok(Self {
            api_url,
            api_key,
            system_prompt,
            request_timeout,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> CompletionConfigBuilder {
        CompletionConfigBuilder::default()
    }

    /// Full chat-completions endpoint URL.
    pub fn completions_url(&self) -> String {
        if self.api_url.contains("/chat/completions") {
            self.api_url.clone()
        } else {
            format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
        }
    }
}

/// Builder for CompletionConfig.
#[derive(Debug, Default)]
pub struct CompletionConfigBuilder {
    config: CompletionConfig,
}

impl CompletionConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Load the system prompt from a file, if it exists and is non-empty.
    pub fn load_prompt_file(mut self, path: impl AsRef<Path>) -> Self {
        if let Some(prompt) = load_prompt_file(path) {
            self.config.system_prompt = prompt;
        }
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CompletionConfig {
        self.config
    }
}

/// Load a prompt file, returning None if not found or empty.
fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
