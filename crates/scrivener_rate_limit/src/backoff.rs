//! Exponential backoff with jitter.

use derive_getters::Getters;
use rand::Rng;
use scrivener_error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Fraction of the computed delay used as the jitter half-width.
const JITTER_FRACTION: f64 = 0.1;

/// Largest accepted `max_delay_secs`: one day.
const MAX_DELAY_CEILING_SECS: f64 = 86_400.0;

/// Retry delay policy.
///
/// `delay(attempt) = min(initial * base^(attempt - 1), max_delay)` with
/// optional uniform noise of ±10% on top, never exceeding `max_delay`.
/// Attempt numbers start at 1; attempt 0 has no delay.
///
/// # Example
///
/// ```toml
/// [rate_limit.backoff]
/// initial_delay_secs = 1.0
/// max_delay_secs = 60.0
/// exponential_base = 2.0
/// jitter = true
/// max_retries = 6
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(default, build_fn(private, name = "build_internal"))]
pub struct BackoffPolicy {
    /// Delay before the second attempt, in seconds
    #[serde(default = "default_initial_delay")]
    initial_delay_secs: f64,

    /// Upper bound for any single delay, in seconds
    #[serde(default = "default_max_delay")]
    max_delay_secs: f64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_exponential_base")]
    exponential_base: f64,

    /// Add ±10% uniform noise to each delay
    #[serde(default = "default_jitter")]
    jitter: bool,

    /// Attempts per logical call, including the first
    #[serde(default = "default_max_retries")]
    max_retries: u32,
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

fn default_max_retries() -> u32 {
    6
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
            max_retries: default_max_retries(),
        }
    }
}

impl BackoffPolicyBuilder {
    /// Build and validate the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if any tunable is out of range.
    pub fn build(&self) -> Result<BackoffPolicy, ConfigError> {
        let policy = self
            .build_internal()
            .map_err(|e| ConfigError::invalid("backoff", e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }
}

impl BackoffPolicy {
    /// Check that every tunable is usable.
    ///
    /// # Errors
    ///
    /// Rejects negative or non-finite delays, `max_delay < initial_delay`,
    /// a `max_delay` above one day, a base below 1 and zero retries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_delay_secs.is_finite() || self.initial_delay_secs < 0.0 {
            return Err(ConfigError::invalid(
                "backoff.initial_delay_secs",
                format!("must be a non-negative number, got {}", self.initial_delay_secs),
            ));
        }
        if !self.max_delay_secs.is_finite() || self.max_delay_secs < self.initial_delay_secs {
            return Err(ConfigError::invalid(
                "backoff.max_delay_secs",
                format!(
                    "must be at least initial_delay_secs ({}), got {}",
                    self.initial_delay_secs, self.max_delay_secs
                ),
            ));
        }
        if self.max_delay_secs > MAX_DELAY_CEILING_SECS {
            return Err(ConfigError::invalid(
                "backoff.max_delay_secs",
                format!(
                    "must be at most {} seconds, got {}",
                    MAX_DELAY_CEILING_SECS, self.max_delay_secs
                ),
            ));
        }
        if !self.exponential_base.is_finite() || self.exponential_base < 1.0 {
            return Err(ConfigError::invalid(
                "backoff.exponential_base",
                format!("must be at least 1.0, got {}", self.exponential_base),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::invalid(
                "backoff.max_retries",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Delay for `attempt` before jitter is applied.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_delay_secs <= 0.0 {
            return Duration::ZERO;
        }

        let exponent = f64::from(attempt - 1);
        let secs = (self.initial_delay_secs * self.exponential_base.powf(exponent))
            .min(self.max_delay_secs);
        to_duration(secs)
    }

    /// Delay for `attempt`, jittered when enabled.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }

        let secs = base.as_secs_f64();
        let range = secs * JITTER_FRACTION;
        let noise = rand::thread_rng().gen_range(-range..=range);
        to_duration((secs + noise).clamp(0.0, self.max_delay_secs))
    }

    /// Sleep for the delay of `attempt` and return how long was slept.
    ///
    /// Only the current task is suspended.
    pub async fn sleep(&self, attempt: u32) -> Duration {
        let delay = self.calculate_delay(attempt);
        if !delay.is_zero() {
            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Backing off"
            );
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

/// Seconds to a [`Duration`], saturating instead of panicking.
fn to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
