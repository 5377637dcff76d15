//! Conversation engine for the chat client.
//!
//! This crate provides the [`ChatEngine`] type which owns the conversation
//! collection and coordinates completions, persistence and sharing.
//!
//! # Features
//!
//! - Multiple conversations, each with at most one reply streaming into it
//! - Cooperative cancellation of in-flight replies
//! - Regeneration of an assistant message from its preceding user turn
//! - Best-effort persistence of every change through `chat-store`
//! - Read-only shared snapshots addressed by an opaque share id
//! - Addresses (`/c/<id>`, `/share/<id>`) and change events for hosts
//!
//! # Architecture
//!
//! ```text
//! host (CLI, UI)
//!      │ send_message / stop_generating / regenerate / share ...
//!      ▼
//! ┌──────────────────────────────────────────────┐
//! │                 CHAT ENGINE                  │
//! │                                              │
//! │  1. Validate and append user + pending reply │
//! │  2. Mark conversation loading                │
//! │  3. Stream completion, replace reply text    │
//! │     on every delta (unless cancelled)        │
//! │  4. Settle reply, or write apology on error  │
//! │  5. Clear loading on every exit path         │
//! └──────────────────────────────────────────────┘
//!      │ Completion                │ PersistentStore
//!      ▼                           ▼
//! completion-client           chat-store (SQLite)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chat_engine::{ChatEngine, EngineSettings};
//! use chat_store::PersistentStore;
//! use completion_client::CompletionClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CompletionClient::from_env()?;
//!     let engine = ChatEngine::load(
//!         PersistentStore::in_memory(),
//!         Arc::new(client),
//!         EngineSettings::from_env(),
//!     )
//!     .await;
//!
//!     engine.send_message("Hello!", None).await;
//!     let conversation = engine.active_conversation();
//!     println!("{}", conversation.messages[1].content);
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod events;
mod route;
mod settings;
mod state;

pub use engine::{
    ChatEngine, EngineSnapshot, SendOutcome, ShareLink, SkipReason, View, APOLOGY_MESSAGE,
    ERROR_MESSAGE,
};
pub use error::{EngineError, Result};
pub use events::EngineEvent;
pub use route::{Route, CONVERSATION_PREFIX, SHARE_PREFIX};
pub use settings::{
    EngineSettings, EngineSettingsBuilder, DEFAULT_DATABASE_URL, DEFAULT_SHARE_BASE_URL,
};
