//! Remote rate limit state parsed from response headers.
//!
//! OpenAI-compatible services report their limits on every response:
//!
//! - `x-ratelimit-limit-requests` / `x-ratelimit-limit-tokens`
//! - `x-ratelimit-remaining-requests` / `x-ratelimit-remaining-tokens`
//! - `x-ratelimit-reset-requests` / `x-ratelimit-reset-tokens` (duration
//!   strings such as `"6m0s"`)
//!
//! [`RateLimitState`] keeps the most recent values per dimension so the
//! manager can refuse calls that would certainly be rejected.

use chrono::{DateTime, TimeDelta, Utc};
use derive_getters::Getters;
use parking_lot::RwLock;
use regex::Regex;
use reqwest::header::HeaderMap;
use scrivener_error::{RateLimitError, RateLimitErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, instrument, warn};

/// Usage fraction above which a dimension is reported as near its limit.
pub const NEAR_LIMIT_THRESHOLD: f64 = 0.9;

/// Prefix shared by every rate limit header.
const HEADER_PREFIX: &str = "x-ratelimit-";

static DURATION_PART: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)([a-zA-Z]+)").ok());

/// A dimension along which the remote service limits usage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitType {
    /// Requests per minute
    #[strum(serialize = "requests_per_minute")]
    RequestsPerMinute,
    /// Tokens per minute
    #[strum(serialize = "tokens_per_minute")]
    TokensPerMinute,
    /// Requests per day
    #[strum(serialize = "requests_per_day")]
    RequestsPerDay,
    /// Tokens per day
    #[strum(serialize = "tokens_per_day")]
    TokensPerDay,
}

impl RateLimitType {
    /// True for dimensions that count requests rather than tokens.
    pub fn counts_requests(&self) -> bool {
        matches!(self, Self::RequestsPerMinute | Self::RequestsPerDay)
    }
}

/// Header names for one dimension.
struct DimensionHeaders {
    kind: RateLimitType,
    limit: &'static str,
    remaining: &'static str,
    reset: &'static str,
}

const TRACKED_HEADERS: [DimensionHeaders; 2] = [
    DimensionHeaders {
        kind: RateLimitType::RequestsPerMinute,
        limit: "x-ratelimit-limit-requests",
        remaining: "x-ratelimit-remaining-requests",
        reset: "x-ratelimit-reset-requests",
    },
    DimensionHeaders {
        kind: RateLimitType::TokensPerMinute,
        limit: "x-ratelimit-limit-tokens",
        remaining: "x-ratelimit-remaining-tokens",
        reset: "x-ratelimit-reset-tokens",
    },
];

/// Remote-reported state of one limit dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct RateLimitInfo {
    /// Allowed units per window
    limit: u64,
    /// Units left in the current window
    remaining: u64,
    /// When the window resets
    reset_time: DateTime<Utc>,
    /// Seconds until reset, as reported
    reset_duration_secs: f64,
}

impl RateLimitInfo {
    /// Record a dimension that resets `reset_duration_secs` from now.
    pub fn new(limit: u64, remaining: u64, reset_duration_secs: f64) -> Self {
        let millis = (reset_duration_secs.max(0.0) * 1000.0) as i64;
        let reset_time = TimeDelta::try_milliseconds(millis)
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            limit,
            remaining,
            reset_time,
            reset_duration_secs,
        }
    }

    /// Percentage of the limit already used, 0 when the limit is 0.
    pub fn usage_percentage(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.limit.saturating_sub(self.remaining) as f64 / self.limit as f64 * 100.0
    }

    /// True once usage reaches `threshold` (a fraction, e.g. 0.9).
    pub fn is_near_limit(&self, threshold: f64) -> bool {
        self.usage_percentage() >= threshold * 100.0
    }
}

/// Outcome of a proactive limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProactiveDecision {
    /// No tracked dimension forbids the call
    Proceed,
    /// A tracked dimension would certainly reject the call
    Block {
        /// Why the call was held back
        reason: String,
    },
}

impl ProactiveDecision {
    /// True for [`ProactiveDecision::Proceed`].
    pub fn can_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// The blocking reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Proceed => None,
            Self::Block { reason } => Some(reason),
        }
    }
}

/// Latest remote limits, one entry per dimension.
///
/// Entries are overwritten when fresh headers arrive and otherwise kept
/// indefinitely.
#[derive(Debug, Default)]
pub struct RateLimitState {
    limits: RwLock<HashMap<RateLimitType, RateLimitInfo>>,
}

impl RateLimitState {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracked dimensions from response headers.
    ///
    /// Header names are matched case-insensitively. A dimension is updated
    /// only when its limit header is present and positive; a missing
    /// remaining header counts as 0 and a missing reset header as 0 seconds.
    /// Malformed values are logged and leave that dimension unchanged.
    /// Returns the number of dimensions updated.
    #[instrument(skip(self, headers), fields(header_count = headers.len()))]
    pub fn update_from_headers(&self, headers: &HashMap<String, String>) -> usize {
        let normalized: HashMap<String, &str> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
            .collect();

        let mut updated = 0;
        for dimension in &TRACKED_HEADERS {
            match parse_dimension(&normalized, dimension) {
                Ok(Some(info)) => {
                    debug!(
                        kind = %dimension.kind,
                        limit = info.limit,
                        remaining = info.remaining,
                        reset_secs = info.reset_duration_secs,
                        "Updated remote rate limit"
                    );
                    self.limits.write().insert(dimension.kind, info);
                    updated += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(kind = %dimension.kind, error = %e, "Skipping malformed rate limit header"),
            }
        }
        updated
    }

    /// Update tracked dimensions from an HTTP header map.
    pub fn update_from_header_map(&self, headers: &HeaderMap) -> usize {
        self.update_from_headers(&collect_rate_limit_headers(headers))
    }

    /// Latest info for one dimension.
    pub fn get(&self, kind: RateLimitType) -> Option<RateLimitInfo> {
        self.limits.read().get(&kind).cloned()
    }

    /// Store info for a dimension learned elsewhere (e.g. daily limits).
    pub fn set(&self, kind: RateLimitType, info: RateLimitInfo) {
        self.limits.write().insert(kind, info);
    }

    /// Copy of every tracked dimension.
    pub fn snapshot(&self) -> BTreeMap<RateLimitType, RateLimitInfo> {
        self.limits
            .read()
            .iter()
            .map(|(kind, info)| (*kind, info.clone()))
            .collect()
    }

    /// Decide whether a call costing `estimated_tokens` can be sent.
    ///
    /// Blocks when a tracked request dimension has nothing remaining or a
    /// tracked token dimension has fewer than `estimated_tokens` remaining.
    /// Dimensions at or above 90% usage are logged but never block.
    pub fn check_proactive(&self, estimated_tokens: u64) -> ProactiveDecision {
        let limits = self.snapshot();

        for (kind, info) in &limits {
            let blocked = if kind.counts_requests() {
                info.remaining == 0
            } else {
                info.remaining < estimated_tokens
            };
            if !blocked {
                continue;
            }

            let reason = if kind.counts_requests() {
                format!(
                    "Request rate limit ({}) exhausted, resets in {:.1}s",
                    kind, info.reset_duration_secs
                )
            } else {
                format!(
                    "Token rate limit ({}) would be exceeded: need {}, have {}",
                    kind, estimated_tokens, info.remaining
                )
            };
            return ProactiveDecision::Block { reason };
        }

        for (kind, info) in &limits {
            if info.is_near_limit(NEAR_LIMIT_THRESHOLD) {
                warn!(
                    kind = %kind,
                    usage_percentage = info.usage_percentage(),
                    "Approaching remote rate limit"
                );
            }
        }

        ProactiveDecision::Proceed
    }
}

fn parse_dimension(
    headers: &HashMap<String, &str>,
    dimension: &DimensionHeaders,
) -> Result<Option<RateLimitInfo>, RateLimitError> {
    let Some(raw_limit) = headers.get(dimension.limit) else {
        return Ok(None);
    };
    let limit = parse_count(dimension.limit, raw_limit)?;
    if limit == 0 {
        return Ok(None);
    }

    let remaining = match headers.get(dimension.remaining) {
        Some(raw) => parse_count(dimension.remaining, raw)?,
        None => 0,
    };
    let reset = headers
        .get(dimension.reset)
        .map(|raw| parse_reset_duration(raw))
        .unwrap_or(0.0);

    Ok(Some(RateLimitInfo::new(limit, remaining, reset)))
}

fn parse_count(header: &str, value: &str) -> Result<u64, RateLimitError> {
    value.parse().map_err(|_| {
        RateLimitError::new(RateLimitErrorKind::InvalidHeader {
            header: header.to_string(),
            value: value.to_string(),
        })
    })
}

/// Parse a reset duration such as `"6m0s"`, `"1s"`, `"2m"` or `"20ms"` into
/// seconds.
///
/// The value is the sum of `(number)(unit)` pairs; `ms`, `s`, `m` and `h`
/// (and their long forms) are recognized and unknown units are ignored. A bare
/// number is taken as seconds. Unparseable input yields 0.
///
/// # Example
///
/// ```
/// use scrivener_rate_limit::parse_reset_duration;
///
/// assert_eq!(parse_reset_duration("6m0s"), 360.0);
/// assert_eq!(parse_reset_duration("1h30m"), 5400.0);
/// assert_eq!(parse_reset_duration("garbage"), 0.0);
/// ```
pub fn parse_reset_duration(value: &str) -> f64 {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
    }

    let Some(pattern) = DURATION_PART.as_ref() else {
        return 0.0;
    };

    pattern
        .captures_iter(value)
        .filter_map(|caps| {
            let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str();
            let multiplier = match unit.to_ascii_lowercase().as_str() {
                "ms" => 0.001,
                "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
                "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
                "h" | "hr" | "hour" | "hours" => 3600.0,
                _ => {
                    debug!(unit, "Ignoring unknown reset duration unit");
                    return None;
                }
            };
            Some(amount * multiplier)
        })
        .sum()
}

/// Copy the rate limit headers (and `retry-after`) out of an HTTP header map.
pub fn collect_rate_limit_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            name.starts_with(HEADER_PREFIX) || name == "retry-after"
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
