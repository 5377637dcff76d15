//! Typed, best-effort facade over a storage backend.

use std::sync::Arc;

use chat_core::{Configuration, ConversationsRecord, ShareId, SharedSnapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{MemoryBackend, StorageBackend};
use crate::Result;

/// Key of the conversation collection and active id.
pub const CONVERSATIONS_KEY: &str = "chat-sessions";
/// Key of the model configuration.
pub const CONFIG_KEY: &str = "chat-config";
/// Key of the user's display name.
pub const DISPLAY_NAME_KEY: &str = "chat-display-name";
/// Prefix of shared snapshot keys.
pub const SHARE_KEY_PREFIX: &str = "chat-shared/";

/// Durable storage for the engine's records.
///
/// Every method is infallible from the caller's side: read failures degrade
/// to `None`/defaults and write failures are logged and dropped.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn StorageBackend>,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// A store that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Conversation collection and active id, if a readable record exists.
    pub async fn load_conversations(&self) -> Option<ConversationsRecord> {
        self.read(CONVERSATIONS_KEY).await
    }

    pub async fn save_conversations(&self, record: &ConversationsRecord) {
        self.write(CONVERSATIONS_KEY, record).await;
    }

    /// Stored configuration, or the default one.
    pub async fn load_config(&self) -> Configuration {
        self.read(CONFIG_KEY).await.unwrap_or_default()
    }

    pub async fn save_config(&self, config: &Configuration) {
        self.write(CONFIG_KEY, config).await;
    }

    /// Store a shared snapshot under its share id.
    ///
    /// Returns whether the write went through; a snapshot that was not
    /// stored would produce a dead link.
    pub async fn put_share(&self, snapshot: &SharedSnapshot) -> bool {
        let key = share_key(&snapshot.share_id);
        match self.try_write(&key, snapshot).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to store shared snapshot {}: {}", snapshot.share_id, e);
                false
            }
        }
    }

    pub async fn get_share(&self, share_id: &ShareId) -> Option<SharedSnapshot> {
        self.read(&share_key(share_id)).await
    }

    pub async fn load_display_name(&self) -> Option<String> {
        match self.backend.get(DISPLAY_NAME_KEY).await {
            Ok(name) => name.filter(|n| !n.trim().is_empty()),
            Err(e) => {
                warn!("Failed to read display name: {}", e);
                None
            }
        }
    }

    pub async fn save_display_name(&self, name: &str) {
        if let Err(e) = self.backend.set(DISPLAY_NAME_KEY, name).await {
            warn!("Failed to store display name: {}", e);
        }
    }

    pub async fn clear_display_name(&self) {
        if let Err(e) = self.backend.remove(DISPLAY_NAME_KEY).await {
            warn!("Failed to clear display name: {}", e);
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_read(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {} from {} storage: {}", key, self.backend.name(), e);
                None
            }
        }
    }

    async fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_write(key, value).await {
            warn!("Failed to write {} to {} storage: {}", key, self.backend.name(), e);
        }
    }

    async fn try_write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw).await?;
        debug!("Stored {} ({} bytes)", key, raw.len());
        Ok(())
    }
}

fn share_key(share_id: &ShareId) -> String {
    format!("{}{}", SHARE_KEY_PREFIX, share_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use async_trait::async_trait;
    use chat_core::{Conversation, ConfigurationPatch, Message};

    /// Backend whose every operation fails.
    struct BrokenBackend;

    #[async_trait]
    impl StorageBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_conversations_round_trip() {
        let store = PersistentStore::in_memory();
        assert!(store.load_conversations().await.is_none());

        let mut conv = Conversation::new();
        conv.messages.push(Message::user("Hello"));
        let record = ConversationsRecord {
            active_id: Some(conv.id.clone()),
            conversations: vec![conv],
        };

        store.save_conversations(&record).await;
        assert_eq!(store.load_conversations().await, Some(record));
    }

    #[tokio::test]
    async fn test_config_defaults_when_missing() {
        let store = PersistentStore::in_memory();
        assert_eq!(store.load_config().await, Configuration::default());

        let mut config = Configuration::default();
        config.apply(ConfigurationPatch::default().temperature(0.1));
        store.save_config(&config).await;
        assert_eq!(store.load_config().await.temperature, 0.1);
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_default() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set(CONFIG_KEY, "{not json").await.unwrap();
        backend.set(CONVERSATIONS_KEY, "[1,2,3]").await.unwrap();

        let store = PersistentStore::new(backend);
        assert_eq!(store.load_config().await, Configuration::default());
        assert!(store.load_conversations().await.is_none());
    }

    #[tokio::test]
    async fn test_shares_are_keyed_by_share_id() {
        let store = PersistentStore::in_memory();
        let mut conv = Conversation::new();
        conv.messages.push(Message::user("Hello"));

        let first = SharedSnapshot::capture(&conv);
        let second = SharedSnapshot::capture(&conv);
        assert!(store.put_share(&first).await);
        assert!(store.put_share(&second).await);

        assert_eq!(store.get_share(&first.share_id).await, Some(first));
        assert_eq!(store.get_share(&second.share_id).await, Some(second));
        assert!(store.get_share(&ShareId::new("missing")).await.is_none());
    }

    #[tokio::test]
    async fn test_display_name() {
        let store = PersistentStore::in_memory();
        assert!(store.load_display_name().await.is_none());

        store.save_display_name("Ada").await;
        assert_eq!(store.load_display_name().await.as_deref(), Some("Ada"));

        store.clear_display_name().await;
        assert!(store.load_display_name().await.is_none());
    }

    #[tokio::test]
    async fn test_broken_backend_never_fails() {
        let store = PersistentStore::new(Arc::new(BrokenBackend));

        assert!(store.load_conversations().await.is_none());
        assert_eq!(store.load_config().await, Configuration::default());
        assert!(store.load_display_name().await.is_none());

        store.save_config(&Configuration::default()).await;
        store.save_display_name("Ada").await;
        store.clear_display_name().await;

        let conv = Conversation::new();
        assert!(!store.put_share(&SharedSnapshot::capture(&conv)).await);
    }
}
