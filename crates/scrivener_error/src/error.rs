//! Top-level error wrapper types.

use crate::{ConfigError, LlmError, RateLimitError, RateLimitSignal, RetryableError, Throttle};

/// Every error condition Scrivener can report.
///
/// # Examples
///
/// ```
/// use scrivener_error::{ScrivenerError, LlmError, LlmErrorKind};
///
/// let err: ScrivenerError = LlmError::new(LlmErrorKind::EmptyResponse).into();
/// assert!(format!("{}", err).contains("LLM Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ScrivenerErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Rate limiting error
    #[from(RateLimitError)]
    RateLimit(RateLimitError),
    /// LLM client error
    #[from(LlmError)]
    Llm(LlmError),
}

/// Scrivener error with kind discrimination.
///
/// # Examples
///
/// ```
/// use scrivener_error::{ConfigError, ScrivenerResult};
///
/// fn might_fail() -> ScrivenerResult<()> {
///     Err(ConfigError::invalid("max_retries", "must be at least 1"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Scrivener Error: {}", _0)]
pub struct ScrivenerError(Box<ScrivenerErrorKind>);

impl ScrivenerError {
    /// Create a new error from a kind.
    pub fn new(kind: ScrivenerErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ScrivenerErrorKind {
        &self.0
    }
}

impl<T> From<T> for ScrivenerError
where
    T: Into<ScrivenerErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

impl RateLimitSignal for ScrivenerError {
    fn throttle(&self) -> Option<&Throttle> {
        match self.kind() {
            ScrivenerErrorKind::RateLimit(err) => err.throttle(),
            _ => None,
        }
    }
}

impl RetryableError for ScrivenerError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            ScrivenerErrorKind::Llm(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for Scrivener operations.
pub type ScrivenerResult<T> = std::result::Result<T, ScrivenerError>;
