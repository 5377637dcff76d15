//! Core types and the completion trait for the chat session engine.
//!
//! This crate provides the shared vocabulary used by the completion client,
//! the persistent store and the conversation engine:
//!
//! - [`Message`] / [`Conversation`] / [`SharedSnapshot`] - the data model
//! - [`Configuration`] - session-wide generation parameters and the model catalog
//! - [`Completion`] - the trait every completion backend implements
//! - [`CancelToken`] - cooperative cancellation for streaming requests
//! - [`CompletionError`] - transport and parse failures
//!
//! # Example
//!
//! ```rust
//! use chat_core::{async_trait, Completion, CompletionError, CompletionRequest, DeltaStream};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl Completion for Canned {
//!     async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
//!         Ok("Hello!".to_string())
//!     }
//!
//!     async fn stream(&self, _request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
//!         let frames = vec![Ok("Hel".to_string()), Ok("Hello!".to_string())];
//!         Ok(Box::pin(futures::stream::iter(frames)))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Canned"
//!     }
//! }
//! ```

mod cancel;
mod completion;
mod config;
mod conversation;
mod error;
mod history;
mod ids;
mod message;
mod prompt;

pub use cancel::CancelToken;
pub use completion::{Completion, CompletionRequest, DeltaStream};
pub use config::{
    find_model, format_param_count, Configuration, ConfigurationPatch, ModelInfo, DEFAULT_MODEL,
    MODEL_CATALOG,
};
pub use conversation::{
    derive_title, Conversation, ConversationsRecord, SharedSnapshot, DEFAULT_TITLE,
    TITLE_MAX_CHARS,
};
pub use error::CompletionError;
pub use history::{history_from, HistoryMessage};
pub use ids::{ConversationId, MessageId, ShareId};
pub use message::{Message, Role};
pub use prompt::{
    hash_prompt, personalize, validate_display_name, DisplayNameError, DEFAULT_SYSTEM_PROMPT,
    DISPLAY_NAME_MAX_CHARS, DISPLAY_NAME_MIN_CHARS,
};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
