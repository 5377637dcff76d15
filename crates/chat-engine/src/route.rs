//! Navigable addresses for conversations and shared snapshots.

use std::fmt;

use chat_core::{ConversationId, ShareId};
use url::Url;

/// Path prefix of a conversation address.
pub const CONVERSATION_PREFIX: &str = "c";

/// Path prefix of a read-only shared view.
pub const SHARE_PREFIX: &str = "share";

/// A location in the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`
    Home,
    /// `/c/<conversation id>`
    Conversation(ConversationId),
    /// `/share/<share id>`, read-only.
    Shared(ShareId),
}

impl Route {
    /// Parse a bare path (`/c/abc`) or an absolute URL
    /// (`https://chat.example.com/share/xyz?ref=1`).
    ///
    /// Returns `None` for paths that match no route.
    pub fn parse(address: &str) -> Option<Self> {
        let address = address.trim();
        let path = match Url::parse(address) {
            Ok(url) => url.path().to_string(),
            Err(_) => address
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Some(Route::Home),
            [CONVERSATION_PREFIX, id] => decode(id).map(|id| Route::Conversation(id.into())),
            [SHARE_PREFIX, id] => decode(id).map(|id| Route::Shared(id.into())),
            _ => None,
        }
    }

    /// Path of this route, with the id percent-encoded.
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Conversation(id) => {
                format!("/{}/{}", CONVERSATION_PREFIX, urlencoding::encode(id.as_str()))
            }
            Route::Shared(id) => {
                format!("/{}/{}", SHARE_PREFIX, urlencoding::encode(id.as_str()))
            }
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn decode(segment: &str) -> Option<String> {
    let decoded = urlencoding::decode(segment).ok()?;
    if decoded.trim().is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}
