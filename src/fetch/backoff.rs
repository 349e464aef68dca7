use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Retry budget and wait schedule for one logical GET.
/// Waits and timeouts are counted in time-units of length `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub base_timeout: u64,
    pub initial_backoff: u64,
    pub max_wait: u64,
    pub unit: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_timeout: 15,
            initial_backoff: 2,
            max_wait: 180,
            unit: Duration::from_secs(1),
        }
    }
}

impl FetchPolicy {
    /// Timeout for attempt `attempt` (0-based): base doubled per attempt, capped at `max_wait`
    pub fn attempt_timeout(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.base_timeout.saturating_mul(factor).min(self.max_wait)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_backoff, self.max_wait)
    }

    /// Convert a count of time-units into a duration
    pub fn units(&self, count: u64) -> Duration {
        self.unit.saturating_mul(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

/// Exponential backoff: each failure waits the current value, which then doubles up to the cap
#[derive(Debug, Clone)]
pub struct Backoff {
    current: u64,
    max: u64,
}

impl Backoff {
    pub fn new(initial: u64, max: u64) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Wait for the failure just observed; advances the schedule
    pub fn next_wait(&mut self) -> u64 {
        let wait = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        wait
    }

    /// Wait after a 429: the server's Retry-After if given, otherwise the backoff wait.
    /// Either way capped at the maximum and the schedule advances.
    pub fn rate_limited_wait(&mut self, retry_after: Option<u64>) -> u64 {
        let fallback = self.next_wait();
        retry_after.unwrap_or(fallback).min(self.max)
    }
}

/// Integer seconds from a Retry-After header; HTTP-date values are not supported
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_monotonic_and_capped() {
        let mut backoff = Backoff::new(2, 180);
        let waits: Vec<u64> = (0..10).map(|_| backoff.next_wait()).collect();

        assert_eq!(&waits[..4], &[2, 4, 8, 16]);
        for pair in waits.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(waits.iter().all(|w| *w <= 180));
        assert_eq!(*waits.last().unwrap(), 180);
    }

    #[test]
    fn test_initial_backoff_above_cap() {
        let mut backoff = Backoff::new(500, 180);
        assert_eq!(backoff.next_wait(), 180);
    }

    #[test]
    fn test_attempt_timeout_doubles() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.attempt_timeout(0), 15);
        assert_eq!(policy.attempt_timeout(1), 30);
        assert_eq!(policy.attempt_timeout(2), 60);
        assert_eq!(policy.attempt_timeout(4), 180);
        assert_eq!(policy.attempt_timeout(70), 180);
    }

    #[test]
    fn test_rate_limited_wait() {
        let mut backoff = Backoff::new(2, 180);
        assert_eq!(backoff.rate_limited_wait(Some(5)), 5);
        assert_eq!(backoff.rate_limited_wait(Some(900)), 180);
        // Retry-After missing: falls back to the backoff schedule (2 -> 4 -> 8)
        assert_eq!(backoff.rate_limited_wait(None), 8);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(5));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_units() {
        let policy = FetchPolicy {
            unit: Duration::from_millis(10),
            ..FetchPolicy::default()
        };
        assert_eq!(policy.units(5), Duration::from_millis(50));
    }
}
