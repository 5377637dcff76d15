//! Chat-completion client for OpenAI-compatible endpoints.
//!
//! This crate implements [`chat_core::Completion`] over HTTP:
//!
//! - [`CompletionClient::complete`](chat_core::Completion::complete) - one
//!   request, returns the first choice's text
//! - [`CompletionClient::stream`](chat_core::Completion::stream) - opens a
//!   `stream=true` request and yields cumulative text per `data:` frame
//! - Configurable via environment variables (`GROQ_*`)
//!
//! # Example
//!
//! ```rust,no_run
//! use chat_core::{CancelToken, Completion, CompletionRequest, Configuration};
//! use completion_client::CompletionClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CompletionClient::from_env()?;
//!     let request = CompletionRequest::new("Hello!", Vec::new(), Configuration::default());
//!
//!     let text = client
//!         .stream_complete(request, &CancelToken::new(), &mut |so_far: &str| {
//!             println!("{}", so_far);
//!         })
//!         .await?;
//!     println!("final: {}", text);
//!     Ok(())
//! }
//! ```

mod api_types;
mod client;
mod config;
pub mod sse;

pub use api_types::{ChatCompletionRequest, ChatMessage};
pub use client::CompletionClient;
pub use config::{
    CompletionConfig, CompletionConfigBuilder, DEFAULT_API_URL, DEFAULT_PROMPT_FILE,
    DEFAULT_TIMEOUT_SECS,
};

// Re-export chat-core types for convenience
pub use chat_core::{
    async_trait, CancelToken, Completion, CompletionError, CompletionRequest, DeltaStream,
};
