use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reconnect backoff policy, adapted from the teacher's
/// `ReconnectionBackoffPolicy` for stream reconnection. §4.2 specifies
/// 2s -> 30s for session reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ReconnectBackoff {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
    pub jitter: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            multiplier: 2,
            max: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconnectState {
    policy: ReconnectBackoff,
    current: Duration,
}

impl From<ReconnectBackoff> for ReconnectState {
    fn from(policy: ReconnectBackoff) -> Self {
        Self {
            current: policy.initial,
            policy,
        }
    }
}

impl ReconnectState {
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }

    pub fn advance(&mut self) -> Duration {
        let jitter = if self.policy.jitter.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=self.policy.jitter.as_millis() as u64))
        };
        let sleep_for = self.current + jitter;
        self.current = (self.current * self.policy.multiplier).min(self.policy.max);
        sleep_for
    }
}
