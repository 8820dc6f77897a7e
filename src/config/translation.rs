// src/config/translation.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_target_lang() -> String {
    "zh-CN".to_string()
}
fn default_batch_size() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "openai" | "mock" | "disabled" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Any OpenAI-compatible chat completions base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    /// Pending records claimed per sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Retry ceiling; a record at the ceiling stays `Failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub translate_body: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: default_api_key(),
            target_lang: default_target_lang(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            translate_body: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TranslationConfig {
    /// Normalize provider casing, sanitize numeric fields and resolve an
    /// `"ENV"` api key. A missing key is left empty; the translator builder
    /// decides what to do with it.
    pub fn resolve(mut self) -> Self {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        self.sanitized()
    }

    /// Zero batch size or timeout fall back to the defaults.
    pub(crate) fn sanitized(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();
        if self.batch_size == 0 {
            self.batch_size = default_batch_size();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
