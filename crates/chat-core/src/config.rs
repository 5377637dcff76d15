//! Model configuration and the catalog of known models.

use serde::{Deserialize, Serialize};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Session-wide generation parameters.
///
/// Applies to every conversation and takes effect on the next send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            top_p: 0.95,
        }
    }
}

impl Configuration {
    /// Shallow-merge a patch into this configuration.
    pub fn apply(&mut self, patch: ConfigurationPatch) {
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(temperature) = patch.temperature {
            self.temperature = temperature;
        }
        if let Some(max_output_tokens) = patch.max_output_tokens {
            self.max_output_tokens = max_output_tokens;
        }
        if let Some(top_p) = patch.top_p {
            self.top_p = top_p;
        }
    }

    /// Catalog entry for the configured model, if it is a known one.
    pub fn model_info(&self) -> Option<&'static ModelInfo> {
        find_model(&self.model)
    }
}

/// Partial configuration update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ConfigurationPatch {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// Display metadata for a known model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Parameter count.
    pub params: u64,
}

/// Models offered to the user.
pub const MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        id: "llama-3.3-70b-versatile",
        name: "Llama 3.3 70B",
        description: "Smart and versatile",
        params: 70_000_000_000,
    },
    ModelInfo {
        id: "llama-3.1-8b-instant",
        name: "Llama 3.1 8B",
        description: "Very fast",
        params: 8_000_000_000,
    },
    ModelInfo {
        id: "meta-llama/llama-4-scout-17b-16e-instruct",
        name: "Llama 4 Scout",
        description: "Newest generation",
        params: 17_000_000_000,
    },
    ModelInfo {
        id: "qwen/qwen3-32b",
        name: "Qwen3 32B",
        description: "Well balanced",
        params: 32_000_000_000,
    },
];

/// Look up a model in the catalog.
pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    MODEL_CATALOG.iter().find(|m| m.id == id)
}

/// Render a parameter count with thousands separators (`70,000,000,000`).
pub fn format_param_count(params: u64) -> String {
    let digits = params.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
