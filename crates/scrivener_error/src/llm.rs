//! LLM client error types and transient-failure classification.

/// LLM client error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum LlmErrorKind {
    /// API key not found in environment
    #[display("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
    /// Connection-level failure (DNS, refused, reset)
    #[display("Transport failure: {}", _0)]
    Transport(String),
    /// Request exceeded the client timeout
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Non-success HTTP status other than 429
    #[display("HTTP {} error: {}", status_code, message)]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// Response body could not be decoded
    #[display("Invalid response: {}", _0)]
    InvalidResponse(String),
    /// Response decoded but carried no usable content
    #[display("Empty content returned by model")]
    EmptyResponse,
    /// Provider name not recognized
    #[display("Unsupported LLM provider: {}", _0)]
    UnsupportedProvider(String),
}

impl LlmErrorKind {
    /// Check if this error is a transient infrastructure failure worth retrying.
    ///
    /// Rate limit rejections (429) are not represented here: they surface as
    /// throttling errors and are retried by the rate limit manager instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmErrorKind::HttpStatus { status_code, .. } => {
                matches!(*status_code, 408 | 500 | 502 | 503 | 504)
            }
            LlmErrorKind::Transport(_) => true,
            LlmErrorKind::Timeout(_) => true,
            _ => false,
        }
    }
}

/// LLM client error with source location tracking.
///
/// # Examples
///
/// ```
/// use scrivener_error::{LlmError, LlmErrorKind, RetryableError};
///
/// let err = LlmError::new(LlmErrorKind::HttpStatus {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("LLM Error: {} at line {} in {}", kind, line, file)]
pub struct LlmError {
    /// The kind of error that occurred
    pub kind: LlmErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl LlmError {
    /// Create a new LlmError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LlmErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Trait for errors that support caller-side retry of transient failures.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    ///
    /// Timeouts, connection failures and 5xx statuses return true. Permanent
    /// errors like 401 or 400 return false.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for LlmError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
