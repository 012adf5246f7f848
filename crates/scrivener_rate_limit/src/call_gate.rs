//! Pluggable gating for outbound calls.

use crate::{RateLimitManager, UsageSnapshot};
use async_trait::async_trait;
use scrivener_error::{RateLimitError, RateLimitSignal};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Capability to run an outbound call under some admission policy.
///
/// [`RateLimitManager`] applies full gating and retry; [`PassThrough`] runs
/// the call once with no limits. Which one a caller gets is decided when the
/// application is configured.
#[async_trait]
pub trait CallGate: Send + Sync {
    /// Run `operation`, possibly several times, under this gate.
    async fn call<F, Fut, T, E>(&self, estimated_tokens: u64, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: RateLimitSignal + From<RateLimitError> + Display + Send;

    /// Feed response headers back to the gate.
    fn record_headers(&self, headers: &HashMap<String, String>);

    /// Current usage, if the gate tracks any.
    fn usage(&self) -> Option<UsageSnapshot>;
}

#[async_trait]
impl CallGate for RateLimitManager {
    async fn call<F, Fut, T, E>(&self, estimated_tokens: u64, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: RateLimitSignal + From<RateLimitError> + Display + Send,
    {
        self.acquire_and_call(estimated_tokens, operation).await
    }

    fn record_headers(&self, headers: &HashMap<String, String>) {
        self.update_rate_limits_from_headers(headers);
    }

    fn usage(&self) -> Option<UsageSnapshot> {
        Some(self.current_usage())
    }
}

#[async_trait]
impl<G: CallGate> CallGate for Arc<G> {
    async fn call<F, Fut, T, E>(&self, estimated_tokens: u64, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: RateLimitSignal + From<RateLimitError> + Display + Send,
    {
        self.as_ref().call(estimated_tokens, operation).await
    }

    fn record_headers(&self, headers: &HashMap<String, String>) {
        self.as_ref().record_headers(headers);
    }

    fn usage(&self) -> Option<UsageSnapshot> {
        self.as_ref().usage()
    }
}

/// Gate that admits every call immediately and never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

#[async_trait]
impl CallGate for PassThrough {
    async fn call<F, Fut, T, E>(&self, _estimated_tokens: u64, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: RateLimitSignal + From<RateLimitError> + Display + Send,
    {
        operation().await
    }

    fn record_headers(&self, _headers: &HashMap<String, String>) {}

    fn usage(&self) -> Option<UsageSnapshot> {
        None
    }
}
