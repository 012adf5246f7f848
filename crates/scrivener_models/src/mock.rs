//! Offline backend producing canned customer complaints.

use async_trait::async_trait;
use regex::Regex;
use scrivener_core::{GenerateRequest, GenerateResponse, LlmConfig, TokenUsage, estimate_tokens};
use scrivener_error::ScrivenerResult;
use scrivener_interface::{HealthStatus, ModelMetadata, TextGenerator};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument};

/// Model name reported by the mock backend.
pub const MOCK_MODEL: &str = "mock-gpt-4";

/// Product used when the prompt does not name one.
const DEFAULT_PRODUCT: &str = "the product";

const TEMPLATES: [&str; 5] = [
    "I am extremely disappointed with {product}. It stopped working after just two weeks and customer support has been unhelpful. I expect a full refund.",
    "The {product} I ordered arrived damaged and the packaging was torn. This is unacceptable for the price I paid. Please send a replacement immediately.",
    "I have been waiting over a month for {product} to be delivered. The tracking number has not updated in weeks and nobody answers my emails.",
    "{product} does not match the description on your website at all. The quality is poor and several features are missing. I want to return it.",
    "I was charged twice for {product} and your billing department keeps transferring my calls. Fix this and refund the duplicate charge.",
];

static PRODUCT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"about\s+([^.]+)").ok());

/// Deterministic stand-in for a real LLM.
///
/// Sleeps for the configured delay, then picks one of five complaint templates
/// from a hash of the prompt and temperature, fills in the product named after
/// "about" in the prompt and truncates to `max_tokens` words.
#[derive(Debug, Clone)]
pub struct MockClient {
    delay: Duration,
    default_max_tokens: u32,
    default_temperature: f32,
}

impl MockClient {
    /// Create a mock backend with an artificial latency.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            default_max_tokens: 500,
            default_temperature: 0.7,
        }
    }

    /// Create a mock backend from the `[llm]` settings.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            delay: Duration::from_millis(*config.mock_delay_ms()),
            default_max_tokens: *config.max_tokens(),
            default_temperature: *config.temperature(),
        }
    }

    /// Configured latency.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn complaint(prompt: &str, temperature: f32, max_tokens: u32) -> String {
        let lowered = prompt.to_lowercase();
        let product = PRODUCT_PATTERN
            .as_ref()
            .and_then(|re| re.captures(&lowered))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());

        let mut hasher = DefaultHasher::new();
        prompt.hash(&mut hasher);
        temperature.to_bits().hash(&mut hasher);
        let index = (hasher.finish() % TEMPLATES.len() as u64) as usize;

        let filled = TEMPLATES[index].replace("{product}", &product);
        let words: Vec<&str> = filled.split_whitespace().collect();
        let limit = max_tokens as usize;
        if words.len() > limit {
            words[..limit].join(" ")
        } else {
            filled
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl TextGenerator for MockClient {
    #[instrument(skip(self, req), fields(prompt_len = req.prompt.len()))]
    async fn generate(&self, req: &GenerateRequest) -> ScrivenerResult<GenerateResponse> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let text = Self::complaint(
            &req.prompt,
            req.temperature.unwrap_or(self.default_temperature),
            req.max_tokens.unwrap_or(self.default_max_tokens),
        );
        let usage = TokenUsage::new(
            estimate_tokens(&req.prompt, MOCK_MODEL),
            estimate_tokens(&text, MOCK_MODEL),
        );
        debug!(chars = text.len(), "Mock response generated");

        Ok(GenerateResponse {
            text,
            usage: Some(usage),
            rate_limit_headers: Default::default(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            provider: self.provider_name(),
            model: MOCK_MODEL.to_string(),
            timeout_secs: None,
            delay_ms: Some(self.delay.as_millis() as u64),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}
