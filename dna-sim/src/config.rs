use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::offset::PriceOffset;
use crate::tie_break::TieBreakPolicy;

/// Configuration for the fixed LONG simulation (§4.8).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub stop: PriceOffset,
    pub take: PriceOffset,
    pub quantity: Decimal,
    pub tie_break: TieBreakPolicy,
    /// Minutes before after-hours ends at which an open trade is forced
    /// closed (default 30).
    pub force_close_offset_minutes: i64,
}

impl SimulationConfig {
    pub fn force_close_offset(&self) -> Duration {
        Duration::minutes(self.force_close_offset_minutes)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            stop: PriceOffset::Percent(dec!(0.4)),
            take: PriceOffset::Percent(dec!(0.5)),
            quantity: dec!(50),
            tie_break: TieBreakPolicy::default(),
            force_close_offset_minutes: 30,
        }
    }
}
