//! Running counters for rate limited calls.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::Serialize;
use std::time::Duration;

use crate::WindowUsage;

/// Smoothing factor of the response time moving average.
const EMA_ALPHA: f64 = 0.1;

/// Counters accumulated across every call through a manager.
///
/// Counters only grow; [`RateLimitMetrics::reset`] is the single way back to
/// zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Getters)]
pub struct RateLimitMetrics {
    /// Attempts started, including blocked ones
    total_requests: u64,
    /// Attempts that succeeded
    successful_requests: u64,
    /// Attempts rejected by the remote service
    rate_limited_requests: u64,
    /// Throttled attempts followed by another attempt
    retried_requests: u64,
    /// Exponential moving average of successful attempt latency
    average_response_time_secs: f64,
    /// Highest trailing-minute request count observed
    peak_rpm: u64,
    /// Highest trailing-minute token count observed
    peak_tpm: u64,
    /// When the counters were last cleared
    last_reset: Option<DateTime<Utc>>,
    #[serde(skip)]
    #[getter(skip)]
    latency_samples: u64,
}

impl RateLimitMetrics {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempt.
    pub fn record_attempt(&mut self) {
        self.total_requests += 1;
    }

    /// Count a success and fold its latency into the average.
    pub fn record_success(&mut self, response_time: Duration) {
        self.successful_requests += 1;

        let sample = response_time.as_secs_f64();
        self.average_response_time_secs = if self.latency_samples == 0 {
            sample
        } else {
            EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * self.average_response_time_secs
        };
        self.latency_samples += 1;
    }

    /// Count a remote rejection.
    pub fn record_rate_limited(&mut self) {
        self.rate_limited_requests += 1;
    }

    /// Count a retry following a rejection.
    pub fn record_retry(&mut self) {
        self.retried_requests += 1;
    }

    /// Raise the peaks to the given trailing-minute usage.
    pub fn observe_usage(&mut self, usage: WindowUsage) {
        self.peak_rpm = self.peak_rpm.max(*usage.requests());
        self.peak_tpm = self.peak_tpm.max(*usage.tokens());
    }

    /// Successful attempts as a percentage of all attempts, 0 with none.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    /// Clear every counter and stamp the reset time.
    pub fn reset(&mut self) {
        *self = Self {
            last_reset: Some(Utc::now()),
            ..Self::default()
        };
    }
}
