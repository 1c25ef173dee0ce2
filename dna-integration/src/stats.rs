use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kind::RequestKind;

/// Point-in-time snapshot for one [`RequestKind`] (§4.1).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct KindStats {
    pub queue_depth: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retry_count: u64,
    pub total_wait: Duration,
    pub wait_samples: u64,
}

impl KindStats {
    pub fn average_wait(&self) -> Duration {
        if self.wait_samples == 0 {
            Duration::ZERO
        } else {
            self.total_wait / self.wait_samples as u32
        }
    }

    pub fn success_ratio(&self) -> f64 {
        let terminal = self.completed + self.failed;
        if terminal == 0 {
            1.0
        } else {
            self.completed as f64 / terminal as f64
        }
    }
}

/// Aggregate stats exposed by `stats()`, per §4.1.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GovernorStats {
    pub by_kind: HashMap<RequestKind, KindStats>,
}

impl GovernorStats {
    pub fn empty() -> Self {
        let mut by_kind = HashMap::new();
        for kind in RequestKind::all() {
            by_kind.insert(kind, KindStats::default());
        }
        Self { by_kind }
    }
}
