//! Rate limiting errors and the throttling signal protocol.

use std::collections::HashMap;
use std::time::Duration;

/// Details of a remote rate limit rejection (HTTP 429 or equivalent).
///
/// Carries the optional `retry-after` hint and the raw response headers so the
/// manager can both honor the hint and refresh its view of the remote limits.
#[derive(Debug, Clone, PartialEq, Default, derive_more::Display)]
#[display("{}", message)]
pub struct Throttle {
    /// Human-readable description from the remote service
    pub message: String,
    /// Explicit wait requested by the remote service
    pub retry_after: Option<Duration>,
    /// Raw response headers, lowercase names
    pub headers: HashMap<String, String>,
}

impl Throttle {
    /// Create a throttle signal with no hint and no headers.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Attach a `retry-after` hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Attach the raw response headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Error kinds for rate limiting operations.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum RateLimitErrorKind {
    /// The remote service rejected the call for rate limiting.
    #[display("Rate limited by remote: {}", _0)]
    Throttled(Throttle),

    /// Every attempt of a call was blocked or throttled.
    #[display("Rate limit max retries ({}) exceeded", attempts)]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// A rate limit header carried a value that could not be parsed.
    #[display("Invalid rate limit header {}: {:?}", header, value)]
    InvalidHeader {
        /// Header name
        header: String,
        /// Raw header value
        value: String,
    },

    /// A limiter was constructed with unusable parameters.
    #[display("Invalid rate limit configuration: {}", _0)]
    InvalidConfig(String),

    /// The concurrency gate was closed while waiting for a permit.
    #[display("Concurrency gate closed")]
    GateClosed,
}

/// Rate limiting error with location tracking.
///
/// # Examples
///
/// ```
/// use scrivener_error::{RateLimitError, RateLimitErrorKind, RateLimitSignal};
///
/// let err = RateLimitError::new(RateLimitErrorKind::MaxRetriesExceeded { attempts: 3 });
/// assert!(err.to_string().contains("max retries (3)"));
/// assert!(err.throttle().is_none());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Rate Limit Error: {} at line {} in {}", kind, line, file)]
pub struct RateLimitError {
    kind: RateLimitErrorKind,
    line: u32,
    file: &'static str,
}

impl RateLimitError {
    /// Create a new rate limiting error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RateLimitErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a remote throttling error.
    #[track_caller]
    pub fn throttled(throttle: Throttle) -> Self {
        Self::new(RateLimitErrorKind::Throttled(throttle))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RateLimitErrorKind {
        &self.kind
    }
}

/// Distinguishes remote throttling from every other failure.
///
/// The rate limit manager retries an operation only when its error reports a
/// [`Throttle`]; any other error is propagated immediately.
pub trait RateLimitSignal {
    /// Returns the throttle details if the remote service rejected the call
    /// for rate limiting.
    fn throttle(&self) -> Option<&Throttle>;
}

impl RateLimitSignal for RateLimitError {
    fn throttle(&self) -> Option<&Throttle> {
        match &self.kind {
            RateLimitErrorKind::Throttled(throttle) => Some(throttle),
            _ => None,
        }
    }
}
