//! LLM connection settings.

use serde::{Deserialize, Serialize};

/// Which backend generates text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAi,
    /// Local canned responses, no network
    #[default]
    Mock,
}

/// Settings for the `[llm]` configuration section.
///
/// # Examples
///
/// ```
/// use scrivener_core::{LlmConfig, LlmProvider};
///
/// let config = LlmConfig::default();
/// assert_eq!(*config.provider(), LlmProvider::Mock);
/// assert_eq!(config.model(), "gpt-4");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend to use
    provider: LlmProvider,
    /// Model identifier sent to the provider
    model: String,
    /// Base URL of the OpenAI-compatible API
    api_base: String,
    /// Per-request timeout in seconds
    timeout_secs: u64,
    /// Default completion budget per request
    max_tokens: u32,
    /// Default sampling temperature
    temperature: f32,
    /// Artificial latency of the mock backend in milliseconds
    mock_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Mock,
            model: "gpt-4".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            max_tokens: 500,
            temperature: 0.7,
            mock_delay_ms: 50,
        }
    }
}

impl LlmConfig {
    /// Return a copy pointing at a different provider.
    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Return a copy pointing at a different API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Return a copy with a different mock latency.
    pub fn with_mock_delay_ms(mut self, mock_delay_ms: u64) -> Self {
        self.mock_delay_ms = mock_delay_ms;
        self
    }
}
