use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Partition of the trading day a bar's timestamp falls into.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl Session {
    pub fn is_regular(self) -> bool {
        matches!(self, Session::Regular)
    }
}
