//! Tests for remote rate limit header tracking.

use reqwest::header::{HeaderMap, HeaderValue};
use scrivener_rate_limit::{
    ProactiveDecision, RateLimitInfo, RateLimitState, RateLimitType, collect_rate_limit_headers,
};
use std::collections::HashMap;

fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn openai_headers() -> HashMap<String, String> {
    headers(&[
        ("x-ratelimit-limit-requests", "60"),
        ("x-ratelimit-remaining-requests", "50"),
        ("x-ratelimit-reset-requests", "10s"),
        ("x-ratelimit-limit-tokens", "40000"),
        ("x-ratelimit-remaining-tokens", "35000"),
        ("x-ratelimit-reset-tokens", "1m"),
    ])
}

#[test]
fn test_parses_both_dimensions() {
    let state = RateLimitState::new();
    assert_eq!(state.update_from_headers(&openai_headers()), 2);

    let requests = state.get(RateLimitType::RequestsPerMinute).unwrap();
    assert_eq!(*requests.limit(), 60);
    assert_eq!(*requests.remaining(), 50);
    assert_eq!(*requests.reset_duration_secs(), 10.0);

    let tokens = state.get(RateLimitType::TokensPerMinute).unwrap();
    assert_eq!(*tokens.limit(), 40000);
    assert_eq!(*tokens.remaining(), 35000);
    assert_eq!(*tokens.reset_duration_secs(), 60.0);
    assert!(*tokens.reset_time() > chrono::Utc::now());
}

#[test]
fn test_header_names_are_case_insensitive() {
    let state = RateLimitState::new();
    state.update_from_headers(&headers(&[
        ("X-RateLimit-Limit-Requests", "100"),
        ("X-RateLimit-Remaining-Requests", "99"),
    ]));

    let requests = state.get(RateLimitType::RequestsPerMinute).unwrap();
    assert_eq!(*requests.limit(), 100);
    assert_eq!(*requests.remaining(), 99);
    assert_eq!(*requests.reset_duration_secs(), 0.0);
}

#[test]
fn test_missing_remaining_counts_as_zero() {
    let state = RateLimitState::new();
    state.update_from_headers(&headers(&[("x-ratelimit-limit-tokens", "1000")]));
    assert_eq!(
        *state
            .get(RateLimitType::TokensPerMinute)
            .unwrap()
            .remaining(),
        0
    );
}

#[test]
fn test_malformed_dimension_is_skipped() {
    let state = RateLimitState::new();
    state.update_from_headers(&openai_headers());

    let updated = state.update_from_headers(&headers(&[
        ("x-ratelimit-limit-requests", "lots"),
        ("x-ratelimit-remaining-requests", "1"),
        ("x-ratelimit-limit-tokens", "40000"),
        ("x-ratelimit-remaining-tokens", "100"),
    ]));
    assert_eq!(updated, 1);

    // Requests keep the earlier values, tokens are refreshed.
    assert_eq!(
        *state
            .get(RateLimitType::RequestsPerMinute)
            .unwrap()
            .remaining(),
        50
    );
    assert_eq!(
        *state
            .get(RateLimitType::TokensPerMinute)
            .unwrap()
            .remaining(),
        100
    );
}

#[test]
fn test_zero_limit_is_ignored() {
    let state = RateLimitState::new();
    assert_eq!(
        state.update_from_headers(&headers(&[("x-ratelimit-limit-requests", "0")])),
        0
    );
    assert!(state.get(RateLimitType::RequestsPerMinute).is_none());
}

#[test]
fn test_proactive_check_without_state_proceeds() {
    assert_eq!(
        RateLimitState::new().check_proactive(1_000_000),
        ProactiveDecision::Proceed
    );
}

#[test]
fn test_proactive_check_blocks_on_requests() {
    let state = RateLimitState::new();
    state.update_from_headers(&headers(&[
        ("x-ratelimit-limit-requests", "60"),
        ("x-ratelimit-remaining-requests", "0"),
        ("x-ratelimit-reset-requests", "2s"),
    ]));

    let decision = state.check_proactive(1);
    assert!(!decision.can_proceed());
    assert!(decision.reason().unwrap().contains("2.0s"));
}

#[test]
fn test_proactive_check_blocks_on_tokens() {
    let state = RateLimitState::new();
    state.update_from_headers(&openai_headers());

    assert!(state.check_proactive(35_000).can_proceed());

    let decision = state.check_proactive(35_001);
    assert!(!decision.can_proceed());
    assert!(decision.reason().unwrap().contains("need 35001"));
}

#[test]
fn test_near_limit_does_not_block() {
    let state = RateLimitState::new();
    state.set(
        RateLimitType::RequestsPerMinute,
        RateLimitInfo::new(100, 5, 30.0),
    );
    assert!(state.check_proactive(10).can_proceed());
}

#[test]
fn test_daily_dimension_can_be_set() {
    let state = RateLimitState::new();
    state.set(RateLimitType::TokensPerDay, RateLimitInfo::new(1000, 10, 3600.0));

    assert!(!state.check_proactive(11).can_proceed());
    assert_eq!(state.snapshot().len(), 1);
}

#[test]
fn test_header_map_input() {
    let mut map = HeaderMap::new();
    map.insert("x-ratelimit-limit-requests", HeaderValue::from_static("500"));
    map.insert("x-ratelimit-remaining-requests", HeaderValue::from_static("499"));
    map.insert("x-ratelimit-reset-requests", HeaderValue::from_static("120ms"));
    map.insert("retry-after", HeaderValue::from_static("3"));
    map.insert("content-type", HeaderValue::from_static("application/json"));

    let collected = collect_rate_limit_headers(&map);
    assert_eq!(collected.len(), 4);
    assert!(!collected.contains_key("content-type"));

    let state = RateLimitState::new();
    assert_eq!(state.update_from_header_map(&map), 1);
    let requests = state.get(RateLimitType::RequestsPerMinute).unwrap();
    assert!((requests.reset_duration_secs() - 0.12).abs() < 1e-9);
}

#[test]
fn test_usage_percentage() {
    let info = RateLimitInfo::new(60, 50, 10.0);
    assert!((info.usage_percentage() - 16.666_666).abs() < 1e-3);
    assert!(!info.is_near_limit(0.9));
}
