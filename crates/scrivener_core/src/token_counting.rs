//! Token estimation and cost calculation for LLM operations.
//!
//! Estimates feed the token-per-minute bucket before a call is made, so they
//! only need to be conservative, not exact.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Loaded encoders by model name; `None` records a model tiktoken does not know.
static ENCODERS: LazyLock<Mutex<HashMap<String, Option<Arc<CoreBPE>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Token usage statistics for a single LLM operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct TokenUsage {
    /// Tokens in the prompt/input.
    prompt_tokens: usize,
    /// Tokens in the response/output.
    completion_tokens: usize,
    /// Total tokens (prompt + completion).
    total_tokens: usize,
}

impl TokenUsage {
    /// Create a new token usage record.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Estimated cost in USD of this usage on `model`.
    pub fn cost(&self, model: &str) -> f64 {
        estimate_completion_cost(self.prompt_tokens, self.completion_tokens, model)
    }
}

fn encoder_for(model: &str) -> Option<Arc<CoreBPE>> {
    let mut encoders = ENCODERS.lock();
    encoders
        .entry(model.to_string())
        .or_insert_with(|| match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(e) => {
                debug!(model, error = %e, "No tokenizer for model, using heuristic");
                None
            }
        })
        .clone()
}

/// Count tokens in `text` for `model`.
///
/// Uses the model's BPE encoder when tiktoken knows it, otherwise falls back to
/// roughly four characters per token (never less than one).
pub fn estimate_tokens(text: &str, model: &str) -> usize {
    match encoder_for(model) {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => (text.chars().count() / 4).max(1),
    }
}

/// Cheap pre-flight estimate used to gate a request.
///
/// Prompt characters divided by four plus the completion budget; avoids
/// loading an encoder on the hot path.
pub fn estimate_request_tokens(prompt: &str, max_tokens: Option<u32>) -> u64 {
    (prompt.len() / 4) as u64 + u64::from(max_tokens.unwrap_or(0))
}

/// Estimate USD cost from prompt and completion token counts.
///
/// Prices are per 1K tokens; unknown models are priced as `gpt-4`.
pub fn estimate_completion_cost(prompt_tokens: usize, completion_tokens: usize, model: &str) -> f64 {
    let (prompt_rate, completion_rate) = match model {
        "gpt-4o" => (0.005, 0.015),
        "gpt-3.5-turbo" => (0.0015, 0.002),
        _ => (0.03, 0.06),
    };
    (prompt_tokens as f64 / 1000.0) * prompt_rate + (completion_tokens as f64 / 1000.0) * completion_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_new() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_unknown_model_uses_heuristic() {
        assert_eq!(estimate_tokens("abcdefgh", "definitely-not-a-model"), 2);
        assert_eq!(estimate_tokens("ab", "definitely-not-a-model"), 1);
    }

    #[test]
    fn test_request_estimate_adds_completion_budget() {
        assert_eq!(estimate_request_tokens("abcdefgh", Some(100)), 102);
        assert_eq!(estimate_request_tokens("", None), 0);
    }
}
