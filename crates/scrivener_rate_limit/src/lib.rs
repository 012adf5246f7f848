//! Adaptive rate limiting and backpressure for outbound LLM calls.
//!
//! This crate gates every call against two local token buckets (requests and
//! tokens per minute), the remote limits last reported in response headers and
//! a concurrency gate, then retries remote throttling with exponential backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use scrivener_rate_limit::{RateLimitManager, ScrivenerConfig};
//! use std::sync::Arc;
//!
//! let config = ScrivenerConfig::load()?;
//! let manager = Arc::new(RateLimitManager::new(config.rate_limit().clone())?);
//!
//! let text = manager
//!     .acquire_and_call(estimated_tokens, || client.generate(&request))
//!     .await?;
//! println!("{:#?}", manager.current_usage());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod bucket;
mod call_gate;
mod config;
mod gate;
mod manager;
mod metrics;
mod state;
mod window;

pub use backoff::{BackoffPolicy, BackoffPolicyBuilder};
pub use bucket::TokenBucket;
pub use call_gate::{CallGate, PassThrough};
pub use config::{RateLimitConfig, RateLimitConfigBuilder, ScrivenerConfig};
pub use gate::{ConcurrencyGate, GatePermit};
pub use manager::{CallSession, RateLimitManager, UsageSnapshot};
pub use metrics::RateLimitMetrics;
pub use state::{
    NEAR_LIMIT_THRESHOLD, ProactiveDecision, RateLimitInfo, RateLimitState, RateLimitType,
    collect_rate_limit_headers, parse_reset_duration,
};
pub use window::{UsageWindow, WindowUsage};

// Re-export error types for convenience
pub use scrivener_error::{RateLimitError, RateLimitErrorKind, RateLimitSignal, Throttle};
