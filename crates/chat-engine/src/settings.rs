//! Engine settings.

use std::env;

/// Default origin used to build share addresses.
pub const DEFAULT_SHARE_BASE_URL: &str = "http://localhost:5173";

/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:chat.db?mode=rwc";

/// Deployment settings for [`ChatEngine`](crate::ChatEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Origin that share addresses are built on (e.g., "https://chat.example.com").
    pub share_base_url: String,

    /// Database URL for the durable store.
    pub database_url: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            share_base_url: DEFAULT_SHARE_BASE_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl EngineSettings {
    /// Create settings from environment variables.
    ///
    /// Optional environment variables:
    /// - `CHAT_SHARE_BASE_URL` - Origin for share links (default: http://localhost:5173)
    /// - `CHAT_DATABASE_URL` - SQLite URL (default: sqlite:chat.db?mode=rwc)
    pub fn from_env() -> Self {
        let share_base_url = env::var("CHAT_SHARE_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SHARE_BASE_URL.to_string());

        let database_url = env::var("CHAT_DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Self {
            share_base_url,
            database_url,
        }
    }

    /// Create a new settings builder.
    pub fn builder() -> EngineSettingsBuilder {
        EngineSettingsBuilder::default()
    }

    /// Absolute address for a path such as `/share/<id>`.
    pub fn address_for(&self, path: &str) -> String {
        format!("{}{}", self.share_base_url.trim_end_matches('/'), path)
    }
}

/// Builder for EngineSettings.
#[derive(Debug, Default)]
pub struct EngineSettingsBuilder {
    settings: EngineSettings,
}

impl EngineSettingsBuilder {
    /// Set the share origin.
    pub fn share_base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.share_base_url = url.into();
        self
    }

    /// Set the database URL.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.settings.database_url = url.into();
        self
    }

    /// Build the settings.
    pub fn build(self) -> EngineSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.share_base_url, "http://localhost:5173");
        assert_eq!(settings.database_url, "sqlite:chat.db?mode=rwc");
    }

    #[test]
    fn test_address_for() {
        let settings = EngineSettings::builder()
            .share_base_url("https://chat.example.com/")
            .build();
        assert_eq!(
            settings.address_for("/share/abc"),
            "https://chat.example.com/share/abc"
        );
    }

    // Environment-based tests are combined into a single test to avoid
    // race conditions when tests run in parallel (env vars are process-global).
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::remove_var("CHAT_SHARE_BASE_URL");
        std::env::remove_var("CHAT_DATABASE_URL");
        assert_eq!(EngineSettings::from_env(), EngineSettings::default());

        std::env::set_var("CHAT_SHARE_BASE_URL", "https://chat.example.com");
        std::env::set_var("CHAT_DATABASE_URL", "sqlite::memory:");
        let settings = EngineSettings::from_env();
        assert_eq!(settings.share_base_url, "https://chat.example.com");
        assert_eq!(settings.database_url, "sqlite::memory:");

        // Blank values fall back to defaults
        std::env::set_var("CHAT_SHARE_BASE_URL", "  ");
        assert_eq!(
            EngineSettings::from_env().share_base_url,
            DEFAULT_SHARE_BASE_URL
        );

        std::env::remove_var("CHAT_SHARE_BASE_URL");
        std::env::remove_var("CHAT_DATABASE_URL");
    }
}
