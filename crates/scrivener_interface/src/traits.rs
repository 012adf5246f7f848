//! Trait definitions for LLM backends.

use crate::{HealthStatus, ModelMetadata};
use async_trait::async_trait;
use scrivener_core::{GenerateRequest, GenerateResponse};
use scrivener_error::ScrivenerResult;
use std::sync::Arc;

/// Core trait that all LLM backends must implement.
///
/// A generator performs exactly one logical call per `generate`. Remote rate
/// limit rejections must surface as throttling errors (see
/// `scrivener_error::RateLimitSignal`) so a rate limit manager can retry them.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a single prompt.
    async fn generate(&self, req: &GenerateRequest) -> ScrivenerResult<GenerateResponse>;

    /// Provider name (e.g., "openai", "mock").
    fn provider_name(&self) -> &'static str;

    /// Model identifier (e.g., "gpt-4").
    fn model_name(&self) -> &str;

    /// Describe the backend.
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            provider: self.provider_name(),
            model: self.model_name().to_string(),
            timeout_secs: None,
            delay_ms: None,
        }
    }

    /// Check whether the backend can currently serve requests.
    ///
    /// The default issues a one-token generation and reports any failure as
    /// unhealthy.
    async fn health_check(&self) -> HealthStatus {
        let probe = GenerateRequest {
            prompt: "Test".to_string(),
            max_tokens: Some(1),
            temperature: Some(0.1),
            model: None,
        };
        match self.generate(&probe).await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy {
                message: e.to_string(),
            },
        }
    }
}

macro_rules! forward_generator {
    ($ptr:ident) => {
        #[async_trait]
        impl<T: TextGenerator + ?Sized> TextGenerator for $ptr<T> {
            async fn generate(&self, req: &GenerateRequest) -> ScrivenerResult<GenerateResponse> {
                (**self).generate(req).await
            }

            fn provider_name(&self) -> &'static str {
                (**self).provider_name()
            }

            fn model_name(&self) -> &str {
                (**self).model_name()
            }

            fn metadata(&self) -> ModelMetadata {
                (**self).metadata()
            }

            async fn health_check(&self) -> HealthStatus {
                (**self).health_check().await
            }
        }
    };
}

forward_generator!(Box);
forward_generator!(Arc);
