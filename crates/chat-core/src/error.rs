//! Error types for completion requests.

use thiserror::Error;

/// Errors that can occur while talking to the completion endpoint.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// Non-success HTTP status, connection failure or unreadable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response body that had to be well-formed was not.
    #[error("parse error: {0}")]
    Parse(String),

    /// The client could not be configured.
    #[error("configuration error: {0}")]
    Configuration(String),
}
