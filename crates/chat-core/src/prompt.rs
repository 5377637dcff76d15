//! System instruction and display-name rules.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Instruction placed before every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Answer clearly and accurately in a natural, friendly tone, and reply in the \
language the user writes in.";

/// Minimum display name length, in characters, after trimming.
pub const DISPLAY_NAME_MIN_CHARS: usize = 2;

/// Maximum display name length, in characters, after trimming.
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;

/// Reasons a display name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayNameError {
    #[error("display name is empty")]
    Empty,

    #[error("display name must be at least {min} characters", min = DISPLAY_NAME_MIN_CHARS)]
    TooShort,

    #[error("display name must be at most {max} characters", max = DISPLAY_NAME_MAX_CHARS)]
    TooLong,
}

/// Trim and validate a display name.
pub fn validate_display_name(name: &str) -> Result<String, DisplayNameError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        Err(DisplayNameError::Empty)
    } else if len < DISPLAY_NAME_MIN_CHARS {
        Err(DisplayNameError::TooShort)
    } else if len > DISPLAY_NAME_MAX_CHARS {
        Err(DisplayNameError::TooLong)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Personalise a base instruction with the user's display name.
pub fn personalize(base: &str, display_name: Option<&str>) -> String {
    match display_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!(
            "{}\n\nThe user's name is {}. Address them by name when it feels natural.",
            base, name
        ),
        None => base.to_string(),
    }
}

/// Compute a stable SHA-256 fingerprint for a prompt string.
pub fn hash_prompt(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
