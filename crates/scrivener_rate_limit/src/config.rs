//! Configuration for rate limiting and the LLM backend.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Bundled defaults (`scrivener.toml` shipped with the library)
//! 2. `~/.config/scrivener/scrivener.toml`
//! 3. `./scrivener.toml`
//! 4. `SCRIVENER__<SECTION>__<KEY>` environment variables

use crate::BackoffPolicy;
use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use scrivener_core::LlmConfig;
use scrivener_error::{ConfigError, ConfigErrorKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../scrivener.toml");

/// Limits enforced locally before any call leaves the process.
///
/// # Example
///
/// ```toml
/// [rate_limit]
/// enabled = true
/// requests_per_minute = 60
/// tokens_per_minute = 40000
/// max_concurrent_requests = 10
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(default, build_fn(private, name = "build_internal"))]
pub struct RateLimitConfig {
    /// Gate calls through the rate limit manager
    #[serde(default = "default_enabled")]
    enabled: bool,

    /// Request bucket capacity, refilled over one minute
    #[serde(default = "default_requests_per_minute")]
    requests_per_minute: u64,

    /// Token bucket capacity, refilled over one minute
    #[serde(default = "default_tokens_per_minute")]
    tokens_per_minute: u64,

    /// Logical calls allowed in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    max_concurrent_requests: usize,

    /// Optional local cap on requests per day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(strip_option))]
    requests_per_day: Option<u32>,

    /// Retry delay tunables
    #[serde(default)]
    backoff: BackoffPolicy,
}

fn default_enabled() -> bool {
    true
}

fn default_requests_per_minute() -> u64 {
    60
}

fn default_tokens_per_minute() -> u64 {
    40_000
}

fn default_max_concurrent_requests() -> usize {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_minute: default_requests_per_minute(),
            tokens_per_minute: default_tokens_per_minute(),
            max_concurrent_requests: default_max_concurrent_requests(),
            requests_per_day: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RateLimitConfigBuilder {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is out of range.
    pub fn build(&self) -> Result<RateLimitConfig, ConfigError> {
        let config = self
            .build_internal()
            .map_err(|e| ConfigError::invalid("rate_limit", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl RateLimitConfig {
    /// Check every limit and the backoff policy.
    ///
    /// # Errors
    ///
    /// Rejects zero limits, zero concurrency and invalid backoff tunables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests_per_minute == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.requests_per_minute",
                "must be at least 1",
            ));
        }
        if self.tokens_per_minute == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.tokens_per_minute",
                "must be at least 1",
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.max_concurrent_requests",
                "must be at least 1",
            ));
        }
        if self.requests_per_day == Some(0) {
            return Err(ConfigError::invalid(
                "rate_limit.requests_per_day",
                "must be at least 1 when set",
            ));
        }
        self.backoff.validate()
    }

    /// Same limits with gating switched off.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Top-level Scrivener configuration.
///
/// # Example
///
/// ```no_run
/// use scrivener_rate_limit::ScrivenerConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScrivenerConfig::load()?;
/// println!("RPM: {}", config.rate_limit().requests_per_minute());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters)]
pub struct ScrivenerConfig {
    /// Local rate limits
    #[serde(default)]
    rate_limit: RateLimitConfig,

    /// LLM backend settings
    #[serde(default)]
    llm: LlmConfig,
}

impl ScrivenerConfig {
    /// Assemble a configuration from its sections.
    pub fn new(rate_limit: RateLimitConfig, llm: LlmConfig) -> Self {
        Self { rate_limit, llm }
    }

    /// Load configuration from a single file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Load(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Load(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.rate_limit.validate()?;
        Ok(config)
    }

    /// Load configuration with the standard precedence.
    ///
    /// Missing user files are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns an error if a present source is malformed or the merged
    /// result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load with the standard precedence plus an explicit file on top.
    ///
    /// # Errors
    ///
    /// Returns an error if `overlay` is missing or any source is malformed.
    #[instrument]
    pub fn load_with(overlay: Option<&Path>) -> Result<Self, ConfigError> {
        debug!("Loading configuration with precedence: env > overlay > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/scrivener/scrivener.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("scrivener").required(false));

        if let Some(path) = overlay {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCRIVENER")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Load(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ConfigError::new(ConfigErrorKind::Load(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.rate_limit.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::new(ConfigErrorKind::Load(format!(
                "Failed to render configuration: {}",
                e
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defaults_parse() {
        let config: ScrivenerConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config, ScrivenerConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let result = RateLimitConfigBuilder::default()
            .requests_per_minute(0u64)
            .build();
        assert!(result.is_err());

        let result = RateLimitConfigBuilder::default()
            .max_concurrent_requests(0usize)
            .build();
        assert!(result.is_err());
    }
}
