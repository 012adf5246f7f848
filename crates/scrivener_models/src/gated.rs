//! Generators wrapped in a call gate.

use async_trait::async_trait;
use scrivener_core::{GenerateRequest, GenerateResponse, estimate_request_tokens};
use scrivener_error::ScrivenerResult;
use scrivener_interface::{HealthStatus, ModelMetadata, TextGenerator};
use scrivener_rate_limit::{CallGate, UsageSnapshot};
use tracing::instrument;

/// A [`TextGenerator`] whose every call passes through a [`CallGate`].
///
/// The token estimate is prompt length / 4 plus the completion budget. Rate
/// limit headers on successful responses are fed back to the gate.
#[derive(Debug)]
pub struct GatedGenerator<G, L> {
    inner: G,
    gate: L,
    default_max_tokens: u32,
}

impl<G: TextGenerator, L: CallGate> GatedGenerator<G, L> {
    /// Wrap `inner` so that calls are admitted by `gate`.
    pub fn new(inner: G, gate: L, default_max_tokens: u32) -> Self {
        Self {
            inner,
            gate,
            default_max_tokens,
        }
    }

    /// The wrapped generator.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// The gate admitting calls.
    pub fn gate(&self) -> &L {
        &self.gate
    }

    /// Usage of the gate, when it tracks any.
    pub fn usage(&self) -> Option<UsageSnapshot> {
        self.gate.usage()
    }
}

#[async_trait]
impl<G: TextGenerator, L: CallGate> TextGenerator for GatedGenerator<G, L> {
    #[instrument(skip(self, req), fields(provider = self.inner.provider_name()))]
    async fn generate(&self, req: &GenerateRequest) -> ScrivenerResult<GenerateResponse> {
        let estimated = estimate_request_tokens(
            &req.prompt,
            Some(req.max_tokens.unwrap_or(self.default_max_tokens)),
        );
        let inner = &self.inner;
        let response = self
            .gate
            .call(estimated, || inner.generate(req))
            .await?;
        if !response.rate_limit_headers.is_empty() {
            self.gate.record_headers(&response.rate_limit_headers);
        }
        Ok(response)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn metadata(&self) -> ModelMetadata {
        self.inner.metadata()
    }

    async fn health_check(&self) -> HealthStatus {
        self.inner.health_check().await
    }
}
