use std::time::Duration;

use rand::Rng;

/// Classification of a dispatch failure, per §4.1/§7.
///
/// Transient: network-level, timeout, or broker-signalled throttling.
/// Fatal: authentication, malformed request, unknown symbol.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FailureClass {
    Transient,
    Fatal,
}

/// Exponential backoff with jitter, base 1s / factor 2 / cap 30s / jitter
/// 10%, per §4.1.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2,
            cap: Duration::from_secs(30),
            jitter: 0.10,
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Backoff duration before retry attempt number `attempt` (1-indexed),
    /// with uniform jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.factor.saturating_pow(attempt.saturating_sub(1).min(16));
        let raw = self.base.saturating_mul(exp).min(self.cap);
        let jitter_range = raw.as_secs_f64() * self.jitter;
        let delta = rand::rng().random_range(-jitter_range..=jitter_range);
        let jittered = (raw.as_secs_f64() + delta).max(0.0);
        Duration::from_secs_f64(jittered)
    }

    pub fn attempts_exhausted(&self, attempt_count: u32) -> bool {
        attempt_count >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_respects_cap() {
        let policy = BackoffPolicy::default();
        let first = policy.delay_for_attempt(1);
        let later = policy.delay_for_attempt(10);
        assert!(first.as_secs_f64() <= 1.1);
        assert!(later <= policy.cap + Duration::from_millis(1));
    }

    #[test]
    fn attempt_cap_is_respected() {
        let policy = BackoffPolicy::default();
        assert!(!policy.attempts_exhausted(4));
        assert!(policy.attempts_exhausted(5));
    }
}
