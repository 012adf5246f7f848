//! Core data types for Scrivener.
//!
//! This crate provides the foundation types shared by the rate limiter, the
//! model clients and the CLI: generation requests and responses, token
//! estimation and pricing, LLM connection settings and tracing setup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod llm_config;
mod request;
mod telemetry;
mod token_counting;

pub use llm_config::{LlmConfig, LlmProvider};
pub use request::{GenerateRequest, GenerateRequestBuilder, GenerateResponse};
pub use telemetry::{LogFormat, init_telemetry};
pub use token_counting::{
    TokenUsage, estimate_completion_cost, estimate_request_tokens, estimate_tokens,
};
