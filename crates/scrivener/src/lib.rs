//! Scrivener - rate limited synthetic text generation
//!
//! Scrivener drives LLM backends under an adaptive rate limiter: local token
//! buckets for requests and tokens per minute, a concurrency gate, proactive
//! checks against the limits the provider reports in its headers, and
//! exponential backoff when the provider throttles anyway.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scrivener::{
//!     GatedGenerator, GenerateRequest, RateLimitManager, ScrivenerConfig, TextGenerator,
//!     build_generator,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScrivenerConfig::load()?;
//!     let manager = Arc::new(RateLimitManager::new(config.rate_limit().clone())?);
//!     let generator = GatedGenerator::new(
//!         build_generator(config.llm())?,
//!         manager,
//!         *config.llm().max_tokens(),
//!     );
//!
//!     let response = generator
//!         .generate(&GenerateRequest::new("Write a complaint about a blender."))
//!         .await?;
//!     println!("{}", response.text);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `scrivener_error` - Error types
//! - `scrivener_core` - Requests, token estimation, LLM settings, tracing setup
//! - `scrivener_interface` - The `TextGenerator` trait
//! - `scrivener_rate_limit` - Buckets, backoff, header tracking, the manager
//! - `scrivener_models` - OpenAI-compatible and mock backends
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use scrivener_error::{
    ConfigError, ConfigErrorKind, LlmError, LlmErrorKind, RateLimitError, RateLimitErrorKind,
    RateLimitSignal, RetryableError, ScrivenerError, ScrivenerErrorKind, ScrivenerResult,
    Throttle,
};

pub use scrivener_core::{
    GenerateRequest, GenerateRequestBuilder, GenerateResponse, LlmConfig, LlmProvider,
    LogFormat, TokenUsage, estimate_completion_cost, estimate_request_tokens, estimate_tokens,
    init_telemetry,
};

pub use scrivener_interface::{HealthStatus, ModelMetadata, TextGenerator};

pub use scrivener_rate_limit::{
    BackoffPolicy, BackoffPolicyBuilder, CallGate, CallSession, ConcurrencyGate, GatePermit,
    PassThrough, ProactiveDecision, RateLimitConfig, RateLimitConfigBuilder, RateLimitInfo,
    RateLimitManager, RateLimitMetrics, RateLimitState, RateLimitType, ScrivenerConfig,
    TokenBucket, UsageSnapshot, UsageWindow, WindowUsage, collect_rate_limit_headers,
    parse_reset_duration,
};

pub use scrivener_models::{
    GatedGenerator, MOCK_MODEL, MockClient, OpenAiClient, build_generator, provider_from_name,
};
