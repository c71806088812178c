use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

/// Per-credential request budget. Swappable for a shared (e.g. Redis-backed) limiter.
pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> RateDecision;
}

/// Seconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateWindow {
    window_id: u64,
    count: u64,
}

/// Fixed epoch-minute counter per credential.
///
/// The counter for a key is read, reset and incremented while its `DashMap` shard is write
/// locked, so concurrent requests with the same key cannot both slip under the budget. Keys in
/// other shards proceed in parallel. Windows live in memory only.
pub struct MinuteWindowLimiter {
    per_minute: i64,
    windows: DashMap<String, RateWindow>,
    clock: Clock,
}

impl MinuteWindowLimiter {
    pub fn new(per_minute: i64) -> Self {
        Self::with_clock(per_minute, system_clock())
    }

    pub fn with_clock(per_minute: i64, clock: Clock) -> Self {
        Self {
            per_minute,
            windows: DashMap::new(),
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.per_minute > 0
    }

    /// Admission decision for `key` at `now_secs`.
    pub fn check_at(&self, key: &str, now_secs: u64) -> RateDecision {
        if !self.is_enabled() {
            return RateDecision::Allowed;
        }

        let window_id = now_secs / WINDOW_SECS;
        let mut window = self
            .windows
            .entry(key.to_string())
            .or_insert(RateWindow { window_id, count: 0 });
        if window.window_id != window_id {
            *window = RateWindow { window_id, count: 0 };
        }
        window.count += 1;

        if window.count > self.per_minute as u64 {
            RateDecision::Limited {
                retry_after_secs: WINDOW_SECS - now_secs % WINDOW_SECS,
            }
        } else {
            RateDecision::Allowed
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl RateLimiter for MinuteWindowLimiter {
    fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, (self.clock)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn request_over_budget_is_rejected_within_the_minute() {
        let limiter = MinuteWindowLimiter::new(3);
        let minute_start = 1_700_000_040;
        for offset in 0..3 {
            assert_eq!(limiter.check_at("k", minute_start + offset), RateDecision::Allowed);
        }
        assert_eq!(
            limiter.check_at("k", minute_start + 15),
            RateDecision::Limited {
                retry_after_secs: 45
            }
        );
    }

    #[test]
    fn next_minute_starts_a_fresh_window() {
        let limiter = MinuteWindowLimiter::new(1);
        let minute_start = 1_700_000_040;
        assert_eq!(limiter.check_at("k", minute_start), RateDecision::Allowed);
        assert!(matches!(
            limiter.check_at("k", minute_start + 59),
            RateDecision::Limited { .. }
        ));
        assert!(matches!(
            limiter.check_at("k", minute_start + 59),
            RateDecision::Limited { .. }
        ));
        assert_eq!(limiter.check_at("k", minute_start + 60), RateDecision::Allowed);
    }

    #[test]
    fn keys_have_independent_budgets() {
        let limiter = MinuteWindowLimiter::new(1);
        assert_eq!(limiter.check_at("a", 60), RateDecision::Allowed);
        assert_eq!(limiter.check_at("b", 60), RateDecision::Allowed);
        assert!(matches!(limiter.check_at("a", 61), RateDecision::Limited { .. }));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn non_positive_budget_disables_limiting() {
        for budget in [0, -1] {
            let limiter = MinuteWindowLimiter::new(budget);
            for _ in 0..1_000 {
                assert_eq!(limiter.check_at("k", 60), RateDecision::Allowed);
            }
            assert_eq!(limiter.tracked_keys(), 0);
        }
    }

    #[test]
    fn injected_clock_drives_check() {
        let now = Arc::new(AtomicU64::new(120));
        let clock: Clock = {
            let now = now.clone();
            Arc::new(move || now.load(Ordering::Relaxed))
        };
        let limiter = MinuteWindowLimiter::with_clock(1, clock);
        assert_eq!(limiter.check("k"), RateDecision::Allowed);
        assert!(matches!(limiter.check("k"), RateDecision::Limited { .. }));
        now.store(180, Ordering::Relaxed);
        assert_eq!(limiter.check("k"), RateDecision::Allowed);
    }

    #[test]
    fn concurrent_burst_admits_exactly_the_budget() {
        let limiter = Arc::new(MinuteWindowLimiter::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check_at("shared", 600) == RateDecision::Allowed)
                        .count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
