//! Mock completion backends for testing the chat session engine.
//!
//! This crate provides implementations of the `Completion` trait that never
//! touch the network:
//! - `ScriptedCompletion` - Streams a fixed list of fragments
//! - `EchoCompletion` - Streams the prompt back word by word
//! - `FailingCompletion` - Rejects every request
//! - `DelayedCompletion` - Wraps another backend with artificial latency
//! - `GatedCompletion` - Holds a stream open until the test releases it
//!
//! For the real endpoint, use the `completion-client` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_completion::{CancelToken, Completion, CompletionRequest, Configuration, ScriptedCompletion};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_completion::CompletionError> {
//!     let backend = ScriptedCompletion::new(["H", "e", "llo"]);
//!     let request = CompletionRequest::new("Hi", Vec::new(), Configuration::default());
//!
//!     let text = backend
//!         .stream_complete(request, &CancelToken::new(), &mut |text: &str| println!("{}", text))
//!         .await?;
//!     assert_eq!(text, "Hello");
//!     Ok(())
//! }
//! ```

mod delayed;
mod echo;
mod failing;
mod gated;
mod scripted;

// Re-export chat-core types for convenience
pub use chat_core::{
    async_trait, CancelToken, Completion, CompletionError, CompletionRequest, Configuration,
    DeltaStream,
};

pub use delayed::DelayedCompletion;
pub use echo::EchoCompletion;
pub use failing::FailingCompletion;
pub use gated::GatedCompletion;
pub use scripted::{cumulative, RequestLog, ScriptedCompletion};
