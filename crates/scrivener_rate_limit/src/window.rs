//! Sliding record of recent attempts.

use derive_getters::Getters;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Entries older than this are discarded.
const RETENTION: Duration = Duration::from_secs(300);

/// Span reported as "last minute" usage.
const RECENT: Duration = Duration::from_secs(60);

/// Requests and tokens observed in the trailing minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Getters)]
pub struct WindowUsage {
    /// Attempts recorded
    requests: u64,
    /// Estimated tokens of those attempts
    tokens: u64,
}

/// Time-ordered `(timestamp, token cost)` pairs for the last five minutes.
///
/// Pruned on every access.
#[derive(Debug, Default)]
pub struct UsageWindow {
    entries: Mutex<VecDeque<(Instant, u64)>>,
}

impl UsageWindow {
    /// Empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt and return the trailing-minute usage including it.
    pub fn record(&self, tokens: u64) -> WindowUsage {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        prune(&mut entries, now);
        entries.push_back((now, tokens));
        recent_usage(&entries, now)
    }

    /// Usage in the trailing minute.
    pub fn last_minute(&self) -> WindowUsage {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        prune(&mut entries, now);
        recent_usage(&entries, now)
    }

    /// Entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn prune(entries: &mut VecDeque<(Instant, u64)>, now: Instant) {
    while let Some((at, _)) = entries.front() {
        if now.saturating_duration_since(*at) > RETENTION {
            entries.pop_front();
        } else {
            break;
        }
    }
}

fn recent_usage(entries: &VecDeque<(Instant, u64)>, now: Instant) -> WindowUsage {
    entries
        .iter()
        .rev()
        .take_while(|(at, _)| now.saturating_duration_since(*at) <= RECENT)
        .fold(WindowUsage::default(), |usage, (_, tokens)| WindowUsage {
            requests: usage.requests + 1,
            tokens: usage.tokens + tokens,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_last_minute_excludes_older_entries() {
        let window = UsageWindow::new();
        window.record(100);
        tokio::time::advance(Duration::from_secs(61)).await;
        window.record(10);

        let usage = window.last_minute();
        assert_eq!(*usage.requests(), 1);
        assert_eq!(*usage.tokens(), 10);
        assert_eq!(window.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prunes_after_retention() {
        let window = UsageWindow::new();
        window.record(5);
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(window.last_minute(), WindowUsage::default());
        assert!(window.is_empty());
    }
}
