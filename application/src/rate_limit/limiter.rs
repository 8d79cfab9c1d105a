//! Sliding-window admission control for one quota pool.

use deliberation_domain::RateLimitConfig;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(86_400);

/// Added to every computed wait so the window has really drained
pub const SAFETY_MARGIN: Duration = Duration::from_millis(500);

/// Errors raised by [`RateLimiter::acquire`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("Daily rate limit exceeded, resets in {:.1} hours", .resets_in.as_secs_f64() / 3600.0)]
    DailyLimitExceeded { resets_in: Duration },
}

/// Current window usage next to the configured ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageStats {
    pub rpm: usize,
    pub rpm_limit: u32,
    pub tpm: u64,
    pub tpm_limit: u64,
    pub rpd: usize,
    pub rpd_limit: u32,
}

impl fmt::Display for UsageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RPM {}/{}, TPM {}/{}, RPD {}/{}",
            self.rpm, self.rpm_limit, self.tpm, self.tpm_limit, self.rpd, self.rpd_limit
        )
    }
}

/// One entry in a window; `reservation` is set while the request is in flight
#[derive(Debug, Clone, Copy)]
struct Stamp {
    at: Instant,
    reservation: Option<u64>,
}

#[derive(Debug, Default)]
struct Windows {
    minute: VecDeque<Stamp>,
    day: VecDeque<Stamp>,
    tokens: VecDeque<(Stamp, u64)>,
    next_reservation: u64,
}

impl Windows {
    fn evict(&mut self, now: Instant) {
        while self
            .minute
            .front()
            .is_some_and(|s| now.duration_since(s.at) > MINUTE)
        {
            self.minute.pop_front();
        }
        while self
            .day
            .front()
            .is_some_and(|s| now.duration_since(s.at) > DAY)
        {
            self.day.pop_front();
        }
        while self
            .tokens
            .front()
            .is_some_and(|(s, _)| now.duration_since(s.at) > MINUTE)
        {
            self.tokens.pop_front();
        }
    }

    fn token_total(&self) -> u64 {
        self.tokens.iter().map(|(_, n)| n).sum()
    }

    fn push(&mut self, stamp: Stamp, tokens: u64) {
        self.minute.push_back(stamp);
        self.day.push_back(stamp);
        self.tokens.push_back((stamp, tokens));
    }

    /// Take a slot now, counted against every window until committed or released
    fn reserve(&mut self, now: Instant, estimated_tokens: u64) -> u64 {
        let id = self.next_reservation;
        self.next_reservation += 1;
        self.push(
            Stamp {
                at: now,
                reservation: Some(id),
            },
            estimated_tokens,
        );
        id
    }

    fn remove(&mut self, id: u64) {
        let held = Some(id);
        self.minute.retain(|s| s.reservation != held);
        self.day.retain(|s| s.reservation != held);
        self.tokens.retain(|(s, _)| s.reservation != held);
    }
}

/// A request slot taken by [`RateLimiter::acquire`].
///
/// Hand it back with [`RateLimiter::commit`] once the request succeeds or
/// [`RateLimiter::release`] when it fails. A dropped admission keeps counting
/// until it ages out of the windows.
#[must_use = "commit or release the admission when the request finishes"]
#[derive(Debug)]
pub struct Admission {
    id: u64,
}

/// Per-pool limiter over requests/minute, tokens/minute and requests/day.
///
/// Window state is behind a mutex so concurrent callers sharing the pool see
/// each other's usage. Admission reserves its slot under the same lock as the
/// check, so two callers can never both take the last slot; the wait itself
/// happens outside the lock.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a request costing `estimated_tokens` fits in every window,
    /// then hold a slot for it.
    ///
    /// Fails fast once the daily ceiling is reached.
    pub async fn acquire(&self, estimated_tokens: u64) -> Result<Admission, RateLimitError> {
        loop {
            let wait = {
                let now = Instant::now();
                let mut windows = self.windows.lock().await;
                windows.evict(now);
                let wait = self.required_wait(&windows, now, estimated_tokens)?;
                if wait.is_zero() {
                    let id = windows.reserve(now, estimated_tokens);
                    return Ok(Admission { id });
                }
                wait
            };
            info!(
                "Rate limit approaching, waiting {:.1}s",
                wait.as_secs_f64()
            );
            sleep(wait + SAFETY_MARGIN).await;
        }
    }

    fn required_wait(
        &self,
        windows: &Windows,
        now: Instant,
        estimated_tokens: u64,
    ) -> Result<Duration, RateLimitError> {
        if windows.day.len() >= self.config.requests_per_day as usize {
            let resets_in = windows
                .day
                .front()
                .map_or(DAY, |s| DAY.saturating_sub(now.duration_since(s.at)));
            return Err(RateLimitError::DailyLimitExceeded { resets_in });
        }

        let until_aged_out = |t: Instant| MINUTE.saturating_sub(now.duration_since(t));
        let mut wait = Duration::ZERO;

        let rpm_ceiling = self
            .config
            .requests_per_minute
            .saturating_sub(self.config.rpm_buffer()) as usize;
        if windows.minute.len() >= rpm_ceiling
            && let Some(oldest) = windows.minute.front()
        {
            wait = wait.max(until_aged_out(oldest.at));
        }

        let projected = (windows.token_total() + estimated_tokens) as f64;
        if projected > self.config.token_ceiling()
            && let Some((oldest, _)) = windows.tokens.front()
        {
            wait = wait.max(until_aged_out(oldest.at));
        }

        if let Some(spacing) = self.config.min_spacing()
            && let Some(last) = windows.minute.back()
        {
            wait = wait.max(spacing.saturating_sub(now.duration_since(last.at)));
        }

        debug!(
            requests = windows.minute.len(),
            tokens = windows.token_total(),
            wait_ms = wait.as_millis() as u64,
            "Rate limiter check"
        );
        Ok(wait)
    }

    /// Count a completed request. Failed requests must not be recorded.
    pub async fn record(&self, tokens_used: u64) {
        let mut windows = self.windows.lock().await;
        windows.push(
            Stamp {
                at: Instant::now(),
                reservation: None,
            },
            tokens_used,
        );
    }

    /// Turn an admission into a recorded request using its actual token count
    pub async fn commit(&self, admission: Admission, tokens_used: u64) {
        let mut windows = self.windows.lock().await;
        windows.remove(admission.id);
        windows.push(
            Stamp {
                at: Instant::now(),
                reservation: None,
            },
            tokens_used,
        );
    }

    /// Give back the slot of a request that failed
    pub async fn release(&self, admission: Admission) {
        self.windows.lock().await.remove(admission.id);
    }

    pub async fn usage_stats(&self) -> UsageStats {
        let mut windows = self.windows.lock().await;
        windows.evict(Instant::now());
        UsageStats {
            rpm: windows.minute.len(),
            rpm_limit: self.config.requests_per_minute,
            tpm: windows.token_total(),
            tpm_limit: self.config.tokens_per_minute,
            rpd: windows.day.len(),
            rpd_limit: self.config.requests_per_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::task::JoinSet;

    fn config(rpm: u32, tpm: u64, rpd: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: rpm,
            tokens_per_minute: tpm,
            requests_per_day: rpd,
            ..RateLimitConfig::default()
        }
    }

    /// Largest number of timestamps falling inside any 60s window
    fn max_in_any_minute(times: &[Instant]) -> usize {
        times
            .iter()
            .map(|start| {
                times
                    .iter()
                    .filter(|t| **t >= *start && t.duration_since(*start) < MINUTE)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(config(50, 100_000, 1000));
        let start = Instant::now();
        let _admission = limiter.acquire(1000).await.unwrap();
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rpm_ceiling_with_buffer_never_exceeded() {
        let limiter = RateLimiter::new(config(20, 10_000_000, 1000));
        let mut recorded = Vec::new();
        for _ in 0..40 {
            let admission = limiter.acquire(10).await.unwrap();
            recorded.push(Instant::now());
            limiter.commit(admission, 10).await;
        }
        // 20 rpm minus a buffer of 2
        assert_eq!(max_in_any_minute(&recorded), 18);
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_rpm_requests_are_spaced() {
        let limiter = RateLimiter::new(config(5, 10_000_000, 1000));
        let mut recorded = Vec::new();
        for _ in 0..8 {
            let admission = limiter.acquire(10).await.unwrap();
            recorded.push(Instant::now());
            limiter.commit(admission, 10).await;
        }
        for pair in recorded.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_secs(12));
        }
        assert!(max_in_any_minute(&recorded) <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_ceiling_waits_for_window() {
        let limiter = RateLimiter::new(config(1000, 10_000, 1000));
        limiter.record(8_000).await;
        let start = Instant::now();
        // 8000 + 1500 exceeds 90% of 10000
        let _admission = limiter.acquire(1500).await.unwrap();
        assert!(Instant::now().duration_since(start) >= MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_limit_fails_fast() {
        let limiter = RateLimiter::new(config(1000, 10_000_000, 2));
        limiter.record(1).await;
        limiter.record(1).await;
        let start = Instant::now();
        let err = limiter.acquire(1).await.unwrap_err();
        assert!(matches!(err, RateLimitError::DailyLimitExceeded { .. }));
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_stats_drop_expired_entries() {
        let limiter = RateLimiter::new(config(50, 100_000, 1000));
        limiter.record(300).await;
        limiter.record(200).await;

        let stats = limiter.usage_stats().await;
        assert_eq!((stats.rpm, stats.tpm, stats.rpd), (2, 500, 2));

        tokio::time::advance(Duration::from_secs(61)).await;
        let stats = limiter.usage_stats().await;
        assert_eq!((stats.rpm, stats.tpm, stats.rpd), (0, 0, 2));
        assert_eq!(stats.rpm_limit, 50);
    }

    /// Two callers sharing a pool, each holding its slot for a second
    async fn admit_pair(limiter: Arc<RateLimiter>) -> Vec<Instant> {
        let mut tasks = JoinSet::new();
        for _ in 0..2 {
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move {
                let admission = limiter.acquire(10).await.unwrap();
                let admitted = Instant::now();
                sleep(Duration::from_secs(1)).await;
                limiter.commit(admission, 10).await;
                admitted
            });
        }
        let mut admitted = tasks.join_all().await;
        admitted.sort();
        admitted
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_cannot_share_the_last_slot() {
        let limiter = Arc::new(RateLimiter::new(config(20, 10_000_000, 1000)));
        let start = Instant::now();
        for _ in 0..17 {
            limiter.record(10).await;
        }

        let admitted = admit_pair(Arc::clone(&limiter)).await;

        let mut timeline = vec![start; 17];
        timeline.extend(admitted);
        assert_eq!(max_in_any_minute(&timeline), 18);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_keep_low_rpm_spacing() {
        let limiter = Arc::new(RateLimiter::new(config(15, 10_000_000, 1000)));
        limiter.record(10).await;

        let admitted = admit_pair(Arc::clone(&limiter)).await;

        assert!(admitted[1].duration_since(admitted[0]) >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_holds_estimate_until_committed() {
        let limiter = RateLimiter::new(config(50, 100_000, 1000));
        let admission = limiter.acquire(1000).await.unwrap();
        let stats = limiter.usage_stats().await;
        assert_eq!((stats.rpm, stats.tpm, stats.rpd), (1, 1000, 1));

        limiter.commit(admission, 40).await;
        let stats = limiter.usage_stats().await;
        assert_eq!((stats.rpm, stats.tpm, stats.rpd), (1, 40, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_admission_does_not_count() {
        let limiter = RateLimiter::new(config(50, 100_000, 1000));
        limiter.record(10).await;
        let admission = limiter.acquire(1000).await.unwrap();
        limiter.release(admission).await;

        let stats = limiter.usage_stats().await;
        assert_eq!((stats.rpm, stats.tpm, stats.rpd), (1, 10, 1));
    }
}
