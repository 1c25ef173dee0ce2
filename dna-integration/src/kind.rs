use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The four request kinds the Rate Governor meters independently (§3, §4.1).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Historical,
    Market,
    Account,
    Order,
}

impl RequestKind {
    /// Default per-kind rolling-window limit, per §4.1.
    pub fn default_limit(self) -> (u32, Duration) {
        match self {
            RequestKind::Historical => (6, Duration::from_secs(60)),
            RequestKind::Market => (100, Duration::from_secs(1)),
            RequestKind::Account => (30, Duration::from_secs(60)),
            RequestKind::Order => (50, Duration::from_secs(60)),
        }
    }

    /// Default per-kind in-flight deadline, per §5.
    pub fn default_deadline(self) -> Duration {
        match self {
            RequestKind::Historical => Duration::from_secs(30),
            RequestKind::Market => Duration::from_secs(10),
            RequestKind::Account => Duration::from_secs(10),
            RequestKind::Order => Duration::from_secs(15),
        }
    }

    pub fn all() -> [RequestKind; 4] {
        [
            RequestKind::Historical,
            RequestKind::Market,
            RequestKind::Account,
            RequestKind::Order,
        ]
    }
}
