//! Tests for the re-exported API working end to end.

use scrivener::{
    GatedGenerator, GenerateRequest, HealthStatus, LlmConfig, MockClient, RateLimitManager,
    ScrivenerConfig, TextGenerator, build_generator, parse_reset_duration,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_default_stack_generates() {
    let config = ScrivenerConfig::default();
    let manager = Arc::new(RateLimitManager::new(config.rate_limit().clone()).unwrap());
    let generator = GatedGenerator::new(
        build_generator(config.llm()).unwrap(),
        Arc::clone(&manager),
        *config.llm().max_tokens(),
    );

    let response = generator
        .generate(&GenerateRequest::new("Write a complaint about a coffee grinder."))
        .await
        .unwrap();
    assert!(!response.text.is_empty());
    assert!(response.usage.is_some());
    assert_eq!(*manager.metrics().successful_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mock_health_and_metadata() {
    let client = MockClient::from_config(&LlmConfig::default());
    assert_eq!(client.delay(), Duration::from_millis(50));
    assert_eq!(client.health_check().await, HealthStatus::Healthy);

    let metadata = client.metadata();
    assert_eq!(metadata.provider, "mock");
    assert_eq!(metadata.delay_ms, Some(50));
}

#[test]
fn test_reset_parsing_is_exposed() {
    assert_eq!(parse_reset_duration("1m30s"), 90.0);
    assert!((parse_reset_duration("120ms") - 0.12).abs() < 1e-9);
}
