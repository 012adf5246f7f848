//! Request and response types for LLM generation.

use crate::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single-prompt text generation request.
///
/// # Examples
///
/// ```
/// use scrivener_core::GenerateRequestBuilder;
///
/// let request = GenerateRequestBuilder::default()
///     .prompt("Write a customer complaint about a late delivery.")
///     .max_tokens(100u32)
///     .temperature(0.7f32)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.max_tokens, Some(100));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, derive_builder::Builder)]
#[builder(setter(into, strip_option), default)]
pub struct GenerateRequest {
    /// Prompt text sent as a single user message
    pub prompt: String,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Model identifier override
    pub model: Option<String>,
}

impl GenerateRequest {
    /// Create a request for `prompt` with provider defaults for everything else.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// The result of one generation call.
///
/// `rate_limit_headers` carries the provider's `x-ratelimit-*` response headers
/// (lowercase names) so callers can feed them back to the rate limit manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerateResponse {
    /// Generated text, trimmed
    pub text: String,
    /// Token accounting reported by the provider, if any
    pub usage: Option<TokenUsage>,
    /// Rate limit headers observed on the response
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub rate_limit_headers: HashMap<String, String>,
}
