//! Per-client sliding-window rate limiting.
//!
//! Each client has two windows of request timestamps: 5 minutes and 24 hours.
//! Timestamps older than a window's span are pruned lazily whenever the
//! client is checked, recorded or queried, so memory per client is bounded by
//! the 24-hour limit. A client whose windows have both emptied is dropped.
//!
//! Only successful analyses are recorded. A request that fails validation or
//! classification does not consume budget.
//!
//! State is in memory and per process; restarting the server resets it.

use crate::config::MailsortConfig;
use crate::error::MailsortError;
use crate::output::RateLimitStatus;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const SHORT_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const LONG_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Request timestamps for one client.
#[derive(Debug, Default)]
pub struct RateLimitWindow {
    short: VecDeque<Instant>,
    long: VecDeque<Instant>,
}

impl RateLimitWindow {
    fn prune(&mut self, now: Instant) {
        prune_older_than(&mut self.short, now, SHORT_WINDOW);
        prune_older_than(&mut self.long, now, LONG_WINDOW);
    }

    fn is_empty(&self) -> bool {
        self.short.is_empty() && self.long.is_empty()
    }
}

fn prune_older_than(stamps: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(&oldest) = stamps.front() {
        if now.saturating_duration_since(oldest) >= span {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

/// In-memory limiter shared by all request handlers.
#[derive(Debug)]
pub struct RateLimiter {
    limit_5min: usize,
    limit_24h: usize,
    clients: Mutex<HashMap<String, RateLimitWindow>>,
}

impl RateLimiter {
    pub fn new(limit_5min: usize, limit_24h: usize) -> Self {
        Self {
            limit_5min,
            limit_24h,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MailsortConfig) -> Self {
        Self::new(config.requests_per_5min, config.requests_per_24h)
    }

    /// Reject when either window is full.
    pub fn check(&self, client: &str) -> Result<(), MailsortError> {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), MailsortError> {
        let mut clients = self.lock();
        let Some(window) = clients.get_mut(client) else {
            return Ok(());
        };
        window.prune(now);
        if window.is_empty() {
            clients.remove(client);
            return Ok(());
        }

        if window.short.len() >= self.limit_5min {
            warn!("Rate limit hit for {}: {} requests in 5 minutes", client, window.short.len());
            return Err(MailsortError::RateLimited {
                limit: self.limit_5min,
                window: "5 minutes",
            });
        }
        if window.long.len() >= self.limit_24h {
            warn!("Rate limit hit for {}: {} requests in 24 hours", client, window.long.len());
            return Err(MailsortError::RateLimited {
                limit: self.limit_24h,
                window: "24 hours",
            });
        }
        Ok(())
    }

    /// Count one successful request against both windows.
    pub fn record(&self, client: &str) {
        self.record_at(client, Instant::now())
    }

    pub fn record_at(&self, client: &str, now: Instant) {
        let mut clients = self.lock();
        let window = clients.entry(client.to_string()).or_default();
        window.prune(now);
        window.short.push_back(now);
        window.long.push_back(now);
        debug!(
            "Recorded request for {}: {} in 5 minutes, {} in 24 hours",
            client,
            window.short.len(),
            window.long.len()
        );
    }

    /// Remaining budget for `client`.
    pub fn status(&self, client: &str) -> RateLimitStatus {
        self.status_at(client, Instant::now())
    }

    pub fn status_at(&self, client: &str, now: Instant) -> RateLimitStatus {
        let mut clients = self.lock();
        let (used_5min, used_24h) = match clients.get_mut(client) {
            Some(window) => {
                window.prune(now);
                (window.short.len(), window.long.len())
            }
            None => (0, 0),
        };
        if used_5min == 0 && used_24h == 0 {
            clients.remove(client);
        }
        RateLimitStatus {
            limit_5min: self.limit_5min,
            remaining_5min: self.limit_5min.saturating_sub(used_5min),
            limit_24h: self.limit_24h,
            remaining_24h: self.limit_24h.saturating_sub(used_24h),
        }
    }

    /// Number of clients with live timestamps.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock cannot leave the map inconsistent, so a
    // poisoned mutex is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(10, 100)
    }

    #[test]
    fn eleventh_request_in_five_minutes_rejected() {
        let rl = limiter();
        let t0 = Instant::now();
        for i in 0..10 {
            let now = t0 + Duration::from_secs(i * 10);
            rl.check_at("1.2.3.4", now).unwrap();
            rl.record_at("1.2.3.4", now);
        }
        let err = rl.check_at("1.2.3.4", t0 + Duration::from_secs(120)).unwrap_err();
        assert!(
            matches!(err, MailsortError::RateLimited { limit: 10, window: "5 minutes" }),
            "got: {err:?}"
        );
    }

    #[test]
    fn clients_are_independent() {
        let rl = limiter();
        let t0 = Instant::now();
        for _ in 0..10 {
            rl.record_at("a", t0);
        }
        assert!(rl.check_at("a", t0).is_err());
        assert!(rl.check_at("b", t0).is_ok());
    }

    #[test]
    fn short_window_expires() {
        let rl = limiter();
        let t0 = Instant::now();
        for _ in 0..10 {
            rl.record_at("a", t0);
        }
        assert!(rl.check_at("a", t0 + Duration::from_secs(299)).is_err());
        assert!(rl.check_at("a", t0 + SHORT_WINDOW).is_ok());
    }

    #[test]
    fn daily_limit_applies_across_short_windows() {
        let rl = limiter();
        let t0 = Instant::now();
        // 100 requests spread out so the 5-minute window never fills.
        for i in 0..100u64 {
            let now = t0 + Duration::from_secs(i * 60);
            rl.check_at("a", now).unwrap();
            rl.record_at("a", now);
        }
        let later = t0 + Duration::from_secs(100 * 60 + 600);
        let err = rl.check_at("a", later).unwrap_err();
        assert!(
            matches!(err, MailsortError::RateLimited { limit: 100, window: "24 hours" }),
            "got: {err:?}"
        );
        assert!(err.to_string().contains("24 hours"));

        // Once the oldest falls out of the day, one slot frees up.
        assert!(rl.check_at("a", t0 + LONG_WINDOW).is_ok());
    }

    #[test]
    fn status_reports_remaining_budget() {
        let rl = limiter();
        let t0 = Instant::now();
        let fresh = rl.status_at("a", t0);
        assert_eq!(fresh.remaining_5min, 10);
        assert_eq!(fresh.remaining_24h, 100);

        rl.record_at("a", t0);
        rl.record_at("a", t0);
        let s = rl.status_at("a", t0 + Duration::from_secs(1));
        assert_eq!(s.limit_5min, 10);
        assert_eq!(s.remaining_5min, 8);
        assert_eq!(s.limit_24h, 100);
        assert_eq!(s.remaining_24h, 98);

        let s = rl.status_at("a", t0 + SHORT_WINDOW);
        assert_eq!(s.remaining_5min, 10);
        assert_eq!(s.remaining_24h, 98);
    }

    #[test]
    fn expired_clients_are_forgotten() {
        let rl = limiter();
        let t0 = Instant::now();
        rl.record_at("a", t0);
        rl.record_at("b", t0);
        assert_eq!(rl.tracked_clients(), 2);

        // Still inside the day: the entry stays.
        rl.check_at("a", t0 + SHORT_WINDOW).unwrap();
        assert_eq!(rl.tracked_clients(), 2);

        rl.check_at("a", t0 + LONG_WINDOW).unwrap();
        assert_eq!(rl.tracked_clients(), 1);

        let s = rl.status_at("b", t0 + LONG_WINDOW);
        assert_eq!(s.remaining_24h, 100);
        assert_eq!(rl.tracked_clients(), 0);

        // Status of an unknown client does not create an entry.
        rl.status_at("c", t0);
        assert_eq!(rl.tracked_clients(), 0);
    }

    #[test]
    fn check_does_not_consume_budget() {
        let rl = limiter();
        let t0 = Instant::now();
        for _ in 0..50 {
            rl.check_at("a", t0).unwrap();
        }
        assert_eq!(rl.status_at("a", t0).remaining_5min, 10);
    }
}
