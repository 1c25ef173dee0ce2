use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bar::BarKey;

/// Why a simulated trade terminated (§3, §4.8).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    ForcedClose,
    OpenAtSessionEnd,
    /// Both stop and take were crossed within the same bar and the
    /// configured tie-break policy is `INDETERMINATE` (§4.8).
    Indeterminate,
}

/// Whether a terminated trade made money (§4.8). Labels with
/// `ExitReason::OpenAtSessionEnd` have no [`Outcome`] and are excluded from
/// population analysis, per §4.8.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// The deterministic outcome of the fixed LONG simulation anchored at one
/// bar (§3, §4.8).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationLabel {
    pub bar_ref: BarKey,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub take_price: Decimal,
    pub shares: Decimal,
    pub exit_bar_ref: Option<BarKey>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: ExitReason,
    pub bars_to_exit: u32,
    pub pnl: Option<Decimal>,
    pub outcome: Option<Outcome>,
    pub labeled_at: DateTime<Utc>,
}

impl SimulationLabel {
    /// False for exit reasons excluded from population analysis (§4.8):
    /// a trade left open at session end, or one whose tie-break policy
    /// declined to pick a side.
    pub fn is_terminal_with_outcome(&self) -> bool {
        !matches!(
            self.exit_reason,
            ExitReason::OpenAtSessionEnd | ExitReason::Indeterminate
        )
    }
}
