use serde::{Deserialize, Serialize};

/// Resolution when both the stop and the take are crossed within the same
/// bar (§4.8). Defaults to the conservative `StopLoss` reading.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    StopLoss,
    TakeProfit,
    Indeterminate,
}

impl Default for TieBreakPolicy {
    fn default() -> Self {
        Self::StopLoss
    }
}
