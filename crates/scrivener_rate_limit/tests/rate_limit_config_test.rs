//! Tests for configuration loading.

use scrivener_core::LlmProvider;
use scrivener_rate_limit::{RateLimitConfig, ScrivenerConfig};
use std::io::Write;

#[test]
fn test_load_bundled_defaults() {
    let config = ScrivenerConfig::load().unwrap();

    let rate_limit = config.rate_limit();
    assert!(*rate_limit.enabled());
    assert!(*rate_limit.requests_per_minute() > 0);
    assert!(*rate_limit.tokens_per_minute() > 0);
    assert!(*rate_limit.max_concurrent_requests() > 0);
    assert!(*rate_limit.backoff().max_retries() > 0);
}

#[test]
fn test_from_file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[rate_limit]
requests_per_minute = 500
tokens_per_minute = 200000
max_concurrent_requests = 4
requests_per_day = 10000

[rate_limit.backoff]
max_retries = 3
jitter = false

[llm]
provider = "openai"
model = "gpt-4o"
"#
    )
    .unwrap();

    let config = ScrivenerConfig::from_file(file.path()).unwrap();
    let rate_limit = config.rate_limit();
    assert_eq!(*rate_limit.requests_per_minute(), 500);
    assert_eq!(*rate_limit.tokens_per_minute(), 200_000);
    assert_eq!(*rate_limit.max_concurrent_requests(), 4);
    assert_eq!(*rate_limit.requests_per_day(), Some(10_000));
    assert_eq!(*rate_limit.backoff().max_retries(), 3);
    assert!(!*rate_limit.backoff().jitter());
    // Unset backoff fields keep their defaults.
    assert_eq!(*rate_limit.backoff().initial_delay_secs(), 1.0);

    assert_eq!(*config.llm().provider(), LlmProvider::OpenAi);
    assert_eq!(config.llm().model(), "gpt-4o");
    assert_eq!(*config.llm().timeout_secs(), 60);
}

#[test]
fn test_overlay_file_takes_precedence() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[rate_limit]\nmax_concurrent_requests = 3").unwrap();

    let config = ScrivenerConfig::load_with(Some(file.path())).unwrap();
    assert_eq!(*config.rate_limit().max_concurrent_requests(), 3);
}

#[test]
fn test_from_file_rejects_invalid_limits() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[rate_limit]\ntokens_per_minute = 0").unwrap();

    assert!(ScrivenerConfig::from_file(file.path()).is_err());
}

#[test]
fn test_from_file_missing_path() {
    assert!(ScrivenerConfig::from_file("/nonexistent/scrivener.toml").is_err());
}

#[test]
fn test_toml_rendering_round_trips() {
    let config = ScrivenerConfig::default();
    let rendered = config.to_toml().unwrap();
    assert!(rendered.contains("[rate_limit]"));
    assert!(rendered.contains("[rate_limit.backoff]"));

    let parsed: ScrivenerConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_validate_rejects_bad_backoff() {
    let config: RateLimitConfig =
        serde_json::from_str(r#"{"backoff": {"exponential_base": 0.5}}"#).unwrap();
    assert!(config.validate().is_err());
}
