//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use scrivener_core::{GenerateRequest, GenerateResponse, LlmConfig, TokenUsage};
use scrivener_error::{
    LlmError, LlmErrorKind, RateLimitError, RetryableError, ScrivenerError, ScrivenerResult,
    Throttle,
};
use scrivener_interface::{ModelMetadata, TextGenerator};
use scrivener_rate_limit::collect_rate_limit_headers;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, instrument, warn};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Transient failures retried per call by default.
const DEFAULT_TRANSIENT_RETRIES: usize = 3;

/// First retry delay for transient failures.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for a transient retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
///
/// Each `generate` is one logical call. Transient infrastructure failures
/// (timeouts, connection errors, 408 and 5xx) are retried here with jittered
/// exponential backoff. A 429 is never retried here: it surfaces as a throttling
/// error carrying `retry-after` and the rate limit headers, for the rate limit
/// manager to handle.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    default_max_tokens: u32,
    default_temperature: f32,
    transient_retries: usize,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// Create a client using the API key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not set or the HTTP client cannot be
    /// built.
    #[instrument(skip_all)]
    pub fn new(config: &LlmConfig) -> ScrivenerResult<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::new(LlmErrorKind::MissingApiKey))?;
        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    #[instrument(skip_all, fields(model = %config.model(), api_base = %config.api_base()))]
    pub fn with_api_key(api_key: impl Into<String>, config: &LlmConfig) -> ScrivenerResult<Self> {
        let timeout = Duration::from_secs(*config.timeout_secs());
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            LlmError::new(LlmErrorKind::Transport(format!(
                "Failed to build HTTP client: {}",
                e
            )))
        })?;

        debug!("Created OpenAI client");

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.api_base().trim_end_matches('/').to_string(),
            model: config.model().clone(),
            timeout,
            default_max_tokens: *config.max_tokens(),
            default_temperature: *config.temperature(),
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Change how often and how soon transient failures are retried.
    pub fn with_transient_retries(mut self, retries: usize, first_delay: Duration) -> Self {
        self.transient_retries = retries;
        self.retry_delay = first_delay;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<GenerateResponse, ScrivenerError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    LlmErrorKind::Timeout(e.to_string())
                } else {
                    LlmErrorKind::Transport(e.to_string())
                };
                LlmError::new(kind)
            })?;

        let status = response.status();
        let headers = collect_rate_limit_headers(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(response.headers());
            let message = response.text().await.unwrap_or_default();
            let mut throttle = Throttle::new(error_message(&message, "Too Many Requests"))
                .with_headers(headers);
            if let Some(delay) = retry_after {
                throttle = throttle.with_retry_after(delay);
            }
            return Err(RateLimitError::throttled(throttle).into());
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::new(LlmErrorKind::HttpStatus {
                status_code: status.as_u16(),
                message: error_message(&message, status.canonical_reason().unwrap_or("error")),
            })
            .into());
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            LlmError::new(LlmErrorKind::InvalidResponse(format!(
                "Failed to parse response: {}",
                e
            )))
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            LlmError::new(LlmErrorKind::InvalidResponse(
                "No response choices returned".to_string(),
            ))
        })?;
        let text = choice
            .message
            .content
            .ok_or_else(|| LlmError::new(LlmErrorKind::EmptyResponse))?
            .trim()
            .to_string();

        Ok(GenerateResponse {
            text,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            rate_limit_headers: headers,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    #[instrument(skip(self, req), fields(model = %self.model, prompt_len = req.prompt.len()))]
    async fn generate(&self, req: &GenerateRequest) -> ScrivenerResult<GenerateResponse> {
        let body = ChatRequest {
            model: req.model.as_deref().unwrap_or(&self.model),
            messages: [ChatMessage {
                role: "user",
                content: &req.prompt,
            }],
            max_tokens: req.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: req.temperature.unwrap_or(self.default_temperature),
        };

        // tokio-retry2 multiplies the base on every step, so a base of 2 with
        // a factor of half the first delay doubles from `retry_delay`.
        let factor = (self.retry_delay.as_millis() as u64 / 2).max(1);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.transient_retries);

        let body = &body;
        Retry::spawn(strategy, || async move {
            match self.send_once(body).await {
                Ok(response) => Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Transient error, will retry");
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        })
        .await
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            provider: self.provider_name(),
            model: self.model.clone(),
            timeout_secs: Some(self.timeout.as_secs()),
            delay_ms: None,
        }
    }
}

/// Parse `retry-after-ms` or `retry-after` (seconds) into a delay.
///
/// Values too large for a [`Duration`] are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let parse = |name: &str| -> Option<f64> {
        headers
            .get(name)?
            .to_str()
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
    };

    match parse("retry-after-ms") {
        Some(ms) => Duration::try_from_secs_f64(ms / 1000.0).ok(),
        None => parse("retry-after").and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw
/// body or `fallback` when empty.
fn error_message(body: &str, fallback: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
