//! Error types for engine operations.

use thiserror::Error;

/// Errors returned by engine operations.
///
/// Completion failures are not represented here: a failed send is reported
/// through [`SendOutcome::Failed`](crate::SendOutcome) and the engine's
/// last error instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A conversation, shared snapshot or route target does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The request was rejected before anything changed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A record the caller depends on could not be stored.
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
