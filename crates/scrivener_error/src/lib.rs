//! Error types for Scrivener.
//!
//! This crate provides the foundation error types used throughout the Scrivener workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Rate limiting errors additionally implement [`RateLimitSignal`], which is how the
//! rate limit manager tells a remote throttling rejection apart from every other failure.
//!
//! # Examples
//!
//! ```
//! use scrivener_error::{LlmError, LlmErrorKind, ScrivenerResult};
//!
//! fn call_model() -> ScrivenerResult<String> {
//!     Err(LlmError::new(LlmErrorKind::EmptyResponse))?
//! }
//!
//! assert!(call_model().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod llm;
mod rate_limit;

pub use config::{ConfigError, ConfigErrorKind};
pub use error::{ScrivenerError, ScrivenerErrorKind, ScrivenerResult};
pub use llm::{LlmError, LlmErrorKind, RetryableError};
pub use rate_limit::{RateLimitError, RateLimitErrorKind, RateLimitSignal, Throttle};
