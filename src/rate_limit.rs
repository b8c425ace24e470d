use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Fixed-window attempt counter keyed by normalized email.
///
/// Used for login failures, reset requests and failed reset confirmations.
pub struct AttemptLimiter {
    /// key -> (count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
        }
    }

    /// Check whether another attempt is allowed without counting it.
    /// Returns Err with retry-after seconds when the key is over its limit.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(key) else {
            return Ok(());
        };

        let (count, start) = entry.value();

        if now.duration_since(*start) > self.window {
            return Ok(());
        }

        if *count >= self.limit {
            return Err(self.retry_after(now, *start));
        }

        Ok(())
    }

    /// Count an attempt against the key.
    pub fn record(&self, key: &str) {
        let now = Instant::now();

        let mut entry = self.entries.entry(key.to_string()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    /// Check and count in one step.
    pub fn hit(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();

        let mut entry = self.entries.entry(key.to_string()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
            return Ok(());
        }

        if *count >= self.limit {
            return Err(self.retry_after(now, *start));
        }

        *count += 1;
        Ok(())
    }

    /// Forget the key, e.g. after a successful login.
    pub fn clear(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove entries whose window started longer ago than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) < max_age);
    }

    fn retry_after(&self, now: Instant, start: Instant) -> u64 {
        let elapsed = now.duration_since(start).as_secs();
        self.window.as_secs().saturating_sub(elapsed).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_does_not_count() {
        let limiter = AttemptLimiter::new(1, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.check("a@b.co").is_ok());
        }
    }

    #[test]
    fn record_trips_check_at_limit() {
        let limiter = AttemptLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("a@b.co").is_ok());
            limiter.record("a@b.co");
        }
        let retry = limiter.check("a@b.co").unwrap_err();
        assert!(retry > 0 && retry <= 60);
        assert!(limiter.check("other@b.co").is_ok());
    }

    #[test]
    fn hit_allows_exactly_limit() {
        let limiter = AttemptLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.hit("k").is_ok());
        assert!(limiter.hit("k").is_ok());
        assert!(limiter.hit("k").is_err());
    }

    #[test]
    fn clear_resets_key() {
        let limiter = AttemptLimiter::new(1, Duration::from_secs(60));
        limiter.record("k");
        assert!(limiter.check("k").is_err());
        limiter.clear("k");
        assert!(limiter.check("k").is_ok());
    }

    #[test]
    fn window_expiry_allows_again() {
        let limiter = AttemptLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.hit("k").is_ok());
        assert!(limiter.hit("k").is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.hit("k").is_ok());
    }

    #[test]
    fn cleanup_drops_stale_entries() {
        let limiter = AttemptLimiter::new(1, Duration::from_secs(60));
        limiter.record("k");
        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup(Duration::from_millis(1));
        assert!(limiter.check("k").is_ok());
    }
}
