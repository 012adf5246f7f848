//! Tests for the OpenAI-compatible client against a mock HTTP server.

use scrivener_core::{GenerateRequest, LlmConfig, LlmProvider};
use scrivener_error::{LlmErrorKind, RateLimitSignal, ScrivenerError, ScrivenerErrorKind};
use scrivener_interface::TextGenerator;
use scrivener_models::OpenAiClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OpenAiClient {
    let config = LlmConfig::default()
        .with_provider(LlmProvider::OpenAi)
        .with_api_base(server.uri());
    OpenAiClient::with_api_key("test-api-key", &config)
        .unwrap()
        .with_transient_retries(2, Duration::from_millis(1))
}

fn completion(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    })
}

fn llm_kind(err: &ScrivenerError) -> Option<&LlmErrorKind> {
    match err.kind() {
        ScrivenerErrorKind::Llm(e) => Some(&e.kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "max_tokens": 50,
            "messages": [{"role": "user", "content": "Write a complaint about a kettle."}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!("  The kettle leaks.  ")))
                .insert_header("x-ratelimit-limit-requests", "5000")
                .insert_header("x-ratelimit-remaining-requests", "4999")
                .insert_header("x-ratelimit-reset-requests", "12ms"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = GenerateRequest {
        max_tokens: Some(50),
        ..GenerateRequest::new("Write a complaint about a kettle.")
    };
    let response = client.generate(&request).await.unwrap();

    assert_eq!(response.text, "The kettle leaks.");
    let usage = response.usage.unwrap();
    assert_eq!(*usage.prompt_tokens(), 12);
    assert_eq!(*usage.completion_tokens(), 8);
    assert_eq!(*usage.total_tokens(), 20);
    assert_eq!(
        response.rate_limit_headers.get("x-ratelimit-remaining-requests"),
        Some(&"4999".to_string())
    );
}

#[tokio::test]
async fn test_too_many_requests_is_throttle_and_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"error": {"message": "Rate limit reached for requests"}}))
                .insert_header("retry-after", "2")
                .insert_header("x-ratelimit-limit-requests", "60")
                .insert_header("x-ratelimit-remaining-requests", "0")
                .insert_header("x-ratelimit-reset-requests", "1s"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerateRequest::new("hello"))
        .await
        .unwrap_err();

    let throttle = err.throttle().expect("429 must surface as a throttle");
    assert_eq!(throttle.retry_after, Some(Duration::from_secs(2)));
    assert_eq!(throttle.message, "Rate limit reached for requests");
    assert_eq!(
        throttle.headers.get("x-ratelimit-remaining-requests"),
        Some(&"0".to_string())
    );
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("recovered"))))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client
        .generate(&GenerateRequest::new("hello"))
        .await
        .unwrap();
    assert_eq!(response.text, "recovered");
}

#[tokio::test]
async fn test_client_error_fails_fast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "Invalid model"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerateRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(err.throttle().is_none());
    match llm_kind(&err) {
        Some(LlmErrorKind::HttpStatus {
            status_code,
            message,
        }) => {
            assert_eq!(*status_code, 400);
            assert_eq!(message, "Invalid model");
        }
        other => panic!("unexpected error kind: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_choices_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerateRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(
        llm_kind(&err),
        Some(LlmErrorKind::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_null_content_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!(null))))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .generate(&GenerateRequest::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(llm_kind(&err), Some(&LlmErrorKind::EmptyResponse));
}

#[tokio::test]
async fn test_health_check_reports_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key"}})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let status = client.health_check().await;
    assert!(!status.is_healthy());

    let metadata = client.metadata();
    assert_eq!(metadata.provider, "openai");
    assert_eq!(metadata.model, "gpt-4");
    assert_eq!(metadata.timeout_secs, Some(60));
}
