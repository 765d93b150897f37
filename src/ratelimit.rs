//! Rate-limit signals and the backoff that honors them.
//!
//! Upstream services report limits via `x-rate-limit-*` response headers
//! (also present on their 429 error responses). The pipeline converts those
//! into a wait: the reported reset time minus now, floored at zero, plus a
//! safety buffer. When no signal is available at all, a conservative fixed
//! default applies — minutes, not seconds.
//!
//! Waiting happens in bounded slices with a progress line after each one, so
//! the process stays observable (and killable) instead of vanishing into a
//! single long sleep.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use tracing::info;

/// Rate-limit metadata from one upstream response. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSignal {
    /// Requests remaining in the current window, if reported.
    pub remaining: Option<u64>,

    /// The window's request ceiling, if reported.
    pub limit: Option<u64>,

    /// Unix timestamp at which the window resets, if reported.
    pub reset_at: Option<i64>,
}

impl RateLimitSignal {
    /// Extracts a signal from `x-rate-limit-{limit,remaining,reset}` headers.
    ///
    /// Returns `None` when none of the three headers is present or parseable;
    /// unparseable individual values degrade to `None` fields.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        fn header_int<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        }

        let signal = RateLimitSignal {
            remaining: header_int(headers, "x-rate-limit-remaining"),
            limit: header_int(headers, "x-rate-limit-limit"),
            reset_at: header_int(headers, "x-rate-limit-reset"),
        };

        if signal.remaining.is_none() && signal.limit.is_none() && signal.reset_at.is_none() {
            None
        } else {
            Some(signal)
        }
    }

    /// True when the window is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// How long to wait on rate-limit signals.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Added on top of the reported reset time. Upstream clocks drift and a
    /// request landing exactly at the reset boundary still 429s.
    pub safety_buffer: Duration,

    /// Wait applied when no reset information is available.
    pub default_wait: Duration,

    /// Upper bound for one sleep slice; a progress line is emitted per slice.
    pub slice: Duration,
}

impl BackoffPolicy {
    pub const DEFAULT: Self = Self {
        safety_buffer: Duration::from_secs(30),
        default_wait: Duration::from_secs(15 * 60),
        slice: Duration::from_secs(30),
    };

    /// Computes the wait for a signal (or its absence), in whole seconds.
    ///
    /// Never negative: a reset timestamp already in the past floors at zero
    /// before the buffer is added.
    pub fn seconds_until_reset(&self, signal: Option<&RateLimitSignal>) -> u64 {
        self.seconds_until_reset_at(signal, Utc::now().timestamp())
    }

    /// As [`seconds_until_reset`](Self::seconds_until_reset), with the clock
    /// injected.
    pub fn seconds_until_reset_at(&self, signal: Option<&RateLimitSignal>, now: i64) -> u64 {
        match signal.and_then(|s| s.reset_at) {
            Some(reset_at) => {
                let until_reset = reset_at.saturating_sub(now).max(0) as u64;
                until_reset + self.safety_buffer.as_secs()
            }
            None => self.default_wait.as_secs(),
        }
    }

    /// Sleeps for `seconds`, in slices, logging the remaining time each slice.
    pub async fn await_reset(&self, seconds: u64) {
        let slice = self.slice.as_secs().max(1);
        let mut remaining = seconds;
        while remaining > 0 {
            info!(remaining_secs = remaining, "waiting for rate limit to reset");
            let step = remaining.min(slice);
            tokio::time::sleep(Duration::from_secs(step)).await;
            remaining -= step;
        }
        info!("rate limit cooldown complete");
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
