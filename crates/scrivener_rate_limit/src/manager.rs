//! Rate limit manager: gating, retry and usage reporting for outbound calls.
//!
//! Every logical call goes through the same state machine:
//!
//! ```text
//! CHECKING -> BUCKET_WAIT -> IN_FLIGHT -> SUCCESS
//!                                      -> RATE_LIMITED -> BACKOFF -> CHECKING
//!                                      -> OTHER_ERROR  -> FAIL
//! ```
//!
//! A concurrency permit is held for the whole logical call. Proactive blocks,
//! bucket exhaustion and remote throttling each use up one attempt.

use crate::{
    BackoffPolicy, ConcurrencyGate, GatePermit, ProactiveDecision, RateLimitConfig,
    RateLimitInfo, RateLimitMetrics, RateLimitState, RateLimitType, TokenBucket, UsageWindow,
};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use scrivener_error::{RateLimitError, RateLimitErrorKind, RateLimitSignal, ScrivenerResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const SECONDS_PER_DAY: u64 = 86_400;

/// Coordinates local buckets, remote limit state and concurrency for every
/// outbound LLM call.
///
/// Build one per process and share it behind an `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// let manager = Arc::new(RateLimitManager::new(config.rate_limit().clone())?);
///
/// let response = manager
///     .acquire_and_call(estimated_tokens, || client.generate(&request))
///     .await?;
/// ```
pub struct RateLimitManager {
    config: RateLimitConfig,
    request_bucket: TokenBucket,
    token_bucket: TokenBucket,
    daily_limiter: Option<DirectRateLimiter>,
    state: RateLimitState,
    gate: ConcurrencyGate,
    metrics: Mutex<RateLimitMetrics>,
    window: UsageWindow,
}

impl RateLimitManager {
    /// Create a manager from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    #[instrument(skip(config), fields(
        rpm = config.requests_per_minute(),
        tpm = config.tokens_per_minute(),
        max_concurrent = config.max_concurrent_requests()
    ))]
    pub fn new(config: RateLimitConfig) -> ScrivenerResult<Self> {
        config.validate()?;

        let request_bucket = TokenBucket::per_minute(*config.requests_per_minute())?;
        let token_bucket = TokenBucket::per_minute(*config.tokens_per_minute())?;
        let daily_limiter = match config.requests_per_day() {
            Some(rpd) => Some(daily_limiter(*rpd)?),
            None => None,
        };
        let gate = ConcurrencyGate::new(*config.max_concurrent_requests());

        info!("Initialized rate limit manager");

        Ok(Self {
            config,
            request_bucket,
            token_bucket,
            daily_limiter,
            state: RateLimitState::new(),
            gate,
            metrics: Mutex::new(RateLimitMetrics::new()),
            window: UsageWindow::new(),
        })
    }

    /// Configuration the manager was built with.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Retry delay policy.
    pub fn backoff(&self) -> &BackoffPolicy {
        self.config.backoff()
    }

    /// Remote limit tracker.
    pub fn state(&self) -> &RateLimitState {
        &self.state
    }

    /// Local request-per-minute bucket.
    pub fn request_bucket(&self) -> &TokenBucket {
        &self.request_bucket
    }

    /// Local token-per-minute bucket.
    pub fn token_bucket(&self) -> &TokenBucket {
        &self.token_bucket
    }

    /// Refresh remote limits from response headers.
    pub fn update_rate_limits_from_headers(&self, headers: &HashMap<String, String>) {
        self.state.update_from_headers(headers);
    }

    /// Refresh remote limits from an HTTP header map.
    pub fn update_rate_limits_from_header_map(&self, headers: &HeaderMap) {
        self.state.update_from_header_map(headers);
    }

    /// Latest remote info for one dimension.
    pub fn get_rate_limit_info(&self, kind: RateLimitType) -> Option<RateLimitInfo> {
        self.state.get(kind)
    }

    /// Record remote info learned outside response headers.
    pub fn set_rate_limit_info(&self, kind: RateLimitType, info: RateLimitInfo) {
        self.state.set(kind, info);
    }

    /// Whether a call of `estimated_tokens` would be allowed by the remote
    /// limits as last reported.
    pub fn check_proactive_limits(&self, estimated_tokens: u64) -> ProactiveDecision {
        self.state.check_proactive(estimated_tokens)
    }

    /// Start a logical call, waiting for a concurrency permit.
    ///
    /// The permit is held by the returned session until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the concurrency gate has been closed.
    #[instrument(skip(self))]
    pub async fn begin(&self, estimated_tokens: u64) -> Result<CallSession<'_>, RateLimitError> {
        let permit = self.gate.acquire().await?;
        Ok(CallSession {
            manager: self,
            estimated_tokens,
            attempt: 0,
            attempt_started: None,
            _permit: permit,
        })
    }

    /// Run `operation` under full gating and retry.
    ///
    /// The operation is invoked once per attempt. Errors that report a
    /// [`Throttle`](scrivener_error::Throttle) are retried (honoring
    /// `retry_after` when present and feeding any headers to the tracker);
    /// every other error is returned immediately. Once every attempt is used
    /// the call fails with [`RateLimitErrorKind::MaxRetriesExceeded`].
    ///
    /// # Errors
    ///
    /// Returns the operation's non-throttling error, or a converted
    /// [`RateLimitError`] when attempts run out.
    #[instrument(skip(self, operation))]
    pub async fn acquire_and_call<F, Fut, T, E>(
        &self,
        estimated_tokens: u64,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RateLimitSignal + From<RateLimitError> + Display,
    {
        let mut session = self.begin(estimated_tokens).await.map_err(E::from)?;

        loop {
            let attempt = match session.next_attempt().await {
                Ok(attempt) => attempt,
                Err(e) => {
                    error!(attempts = session.attempt(), "Rate limited call exhausted its attempts");
                    return Err(E::from(e));
                }
            };

            let retry_after = match operation().await {
                Ok(value) => {
                    session.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    let throttled = err.throttle().map(|throttle| {
                        if !throttle.headers.is_empty() {
                            self.update_rate_limits_from_headers(&throttle.headers);
                        }
                        throttle.retry_after
                    });
                    let Some(retry_after) = throttled else {
                        error!(attempt, error = %err, "Unexpected error in rate limited call");
                        return Err(err);
                    };
                    retry_after
                }
            };

            session.record_rate_limited(retry_after).await;
        }
    }

    /// Snapshot of local usage, remote limits and metrics.
    ///
    /// Reading the snapshot does not change any counter.
    pub fn current_usage(&self) -> UsageSnapshot {
        let recent = self.window.last_minute();
        let requests_per_minute_limit = *self.config.requests_per_minute();
        let tokens_per_minute_limit = *self.config.tokens_per_minute();
        let metrics = self.metrics();
        let success_rate = metrics.success_rate();

        UsageSnapshot {
            requests_last_minute: *recent.requests(),
            tokens_last_minute: *recent.tokens(),
            requests_per_minute_limit,
            tokens_per_minute_limit,
            request_usage_percentage: percentage(*recent.requests(), requests_per_minute_limit),
            token_usage_percentage: percentage(*recent.tokens(), tokens_per_minute_limit),
            concurrent_requests: self.gate.in_use(),
            available_permits: self.gate.available(),
            max_concurrent_requests: self.gate.max_permits(),
            remote_limits: self.state.snapshot(),
            metrics,
            success_rate,
        }
    }

    /// Copy of the accumulated metrics.
    pub fn metrics(&self) -> RateLimitMetrics {
        self.metrics.lock().clone()
    }

    /// Clear the accumulated metrics.
    pub fn reset_metrics(&self) {
        self.metrics.lock().reset();
    }

    /// Take one request and `estimated_tokens` tokens from the local budgets.
    ///
    /// Budgets are tried in order and the first refusal stops the check, so
    /// the token bucket is untouched when the request bucket refuses. Units
    /// taken by an earlier budget are kept even when a later one fails.
    fn try_consume_budget(&self, estimated_tokens: u64) -> Result<(), &'static str> {
        if !self.request_bucket.consume(1) {
            return Err("request bucket exhausted");
        }
        if !self.token_bucket.consume(estimated_tokens) {
            return Err("token bucket exhausted");
        }
        if let Some(limiter) = &self.daily_limiter
            && limiter.check().is_err()
        {
            return Err("daily request cap reached");
        }
        Ok(())
    }
}

impl std::fmt::Debug for RateLimitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitManager")
            .field("config", &self.config)
            .field("request_bucket", &self.request_bucket)
            .field("token_bucket", &self.token_bucket)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

fn daily_limiter(requests_per_day: u32) -> Result<DirectRateLimiter, RateLimitError> {
    let invalid = || {
        RateLimitError::new(RateLimitErrorKind::InvalidConfig(format!(
            "requests_per_day must be at least 1, got {}",
            requests_per_day
        )))
    };
    let burst = NonZeroU32::new(requests_per_day).ok_or_else(invalid)?;
    let period = Duration::from_secs(SECONDS_PER_DAY) / requests_per_day;
    let quota = Quota::with_period(period).ok_or_else(invalid)?.allow_burst(burst);
    Ok(GovernorRateLimiter::direct(quota))
}

fn percentage(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    used as f64 / limit as f64 * 100.0
}

/// One logical call in progress.
///
/// Holds the concurrency permit until dropped. Drive it with
/// [`next_attempt`](Self::next_attempt) and report each outcome with
/// [`record_success`](Self::record_success) or
/// [`record_rate_limited`](Self::record_rate_limited).
///
/// # Example
///
/// ```rust,ignore
/// let mut session = manager.begin(estimated_tokens).await?;
/// loop {
///     session.next_attempt().await?;
///     match client.send(&request).await {
///         Ok(response) => {
///             session.record_success();
///             break Ok(response);
///         }
///         Err(e) if e.is_429() => session.record_rate_limited(e.retry_after()).await,
///         Err(e) => break Err(e),
///     }
/// }
/// ```
#[derive(Debug)]
pub struct CallSession<'a> {
    manager: &'a RateLimitManager,
    estimated_tokens: u64,
    attempt: u32,
    attempt_started: Option<Instant>,
    _permit: GatePermit,
}

impl CallSession<'_> {
    /// Attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Token estimate this call is charged.
    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    /// Wait until the caller may send the request.
    ///
    /// Each loop iteration is one attempt: the proactive check runs first,
    /// then the local budgets. A refusal from either backs off and moves to
    /// the next attempt. Returns the number of the attempt the caller should
    /// perform.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitErrorKind::MaxRetriesExceeded`] once every attempt
    /// has been used.
    pub async fn next_attempt(&mut self) -> Result<u32, RateLimitError> {
        let manager = self.manager;
        let max_attempts = *manager.backoff().max_retries();

        while self.attempt < max_attempts {
            self.attempt += 1;
            let attempt = self.attempt;
            manager.metrics.lock().record_attempt();

            if let ProactiveDecision::Block { reason } =
                manager.state.check_proactive(self.estimated_tokens)
            {
                warn!(attempt, %reason, "Proactive rate limit block");
                manager.backoff().sleep(attempt).await;
                continue;
            }

            if let Err(reason) = manager.try_consume_budget(self.estimated_tokens) {
                warn!(
                    attempt,
                    reason,
                    estimated_tokens = self.estimated_tokens,
                    "Local rate limit reached"
                );
                manager.backoff().sleep(attempt).await;
                continue;
            }

            let usage = manager.window.record(self.estimated_tokens);
            manager.metrics.lock().observe_usage(usage);
            self.attempt_started = Some(Instant::now());

            debug!(attempt, estimated_tokens = self.estimated_tokens, "Attempt cleared");
            return Ok(attempt);
        }

        Err(RateLimitError::new(RateLimitErrorKind::MaxRetriesExceeded {
            attempts: self.attempt,
        }))
    }

    /// Report that the current attempt succeeded, ending the call.
    pub fn record_success(self) {
        let elapsed = self
            .attempt_started
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.manager.metrics.lock().record_success(elapsed);
        debug!(
            attempt = self.attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "Rate limited call succeeded"
        );
    }

    /// Report that the remote service throttled the current attempt.
    ///
    /// Sleeps exactly `retry_after` when given, otherwise the backoff delay
    /// for this attempt.
    pub async fn record_rate_limited(&mut self, retry_after: Option<Duration>) {
        let manager = self.manager;
        manager.metrics.lock().record_rate_limited();

        warn!(
            attempt = self.attempt,
            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
            "Rate limited by remote"
        );

        match retry_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => {
                manager.backoff().sleep(self.attempt).await;
            }
        }

        if self.attempt < *manager.backoff().max_retries() {
            manager.metrics.lock().record_retry();
        }
    }
}

/// Point-in-time view of a manager's usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    /// Attempts cleared in the trailing minute
    pub requests_last_minute: u64,
    /// Estimated tokens cleared in the trailing minute
    pub tokens_last_minute: u64,
    /// Configured requests per minute
    pub requests_per_minute_limit: u64,
    /// Configured tokens per minute
    pub tokens_per_minute_limit: u64,
    /// Trailing-minute requests as a percentage of the limit
    pub request_usage_percentage: f64,
    /// Trailing-minute tokens as a percentage of the limit
    pub token_usage_percentage: f64,
    /// Logical calls holding a permit
    pub concurrent_requests: usize,
    /// Permits free
    pub available_permits: usize,
    /// Configured permits
    pub max_concurrent_requests: usize,
    /// Latest remote-reported limits
    pub remote_limits: BTreeMap<RateLimitType, RateLimitInfo>,
    /// Accumulated counters
    pub metrics: RateLimitMetrics,
    /// Successful attempts as a percentage of all attempts
    pub success_rate: f64,
}
