//! Durable local storage for the chat session engine.
//!
//! Records are JSON documents kept under fixed keys in a [`StorageBackend`]:
//! the conversation collection with the active id, the model configuration,
//! the display name, and one record per shared snapshot. [`PersistentStore`]
//! wraps a backend with typed accessors that never fail.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_store::{PersistentStore, SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let backend = SqliteBackend::connect("sqlite:chat.db?mode=rwc").await?;
//!     backend.migrate().await?;
//!
//!     let store = PersistentStore::new(Arc::new(backend));
//!     let config = store.load_config().await;
//!     println!("model: {}", config.model);
//!
//!     Ok(())
//! }
//! ```

mod backend;
mod error;
mod sqlite;
mod store;

pub use backend::{MemoryBackend, StorageBackend};
pub use error::{Result, StoreError};
pub use sqlite::SqliteBackend;
pub use store::{
    PersistentStore, CONFIG_KEY, CONVERSATIONS_KEY, DISPLAY_NAME_KEY, SHARE_KEY_PREFIX,
};
