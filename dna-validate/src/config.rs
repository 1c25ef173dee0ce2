use dna_instrument::Session;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Per-session maximum tolerated inter-bar percent move before it is
/// itself suspicious, independent of the rolling-window check (§4.4).
/// Regular hours are stricter; pre/after market allow wider gaps.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MovementToleranceTable {
    pub pre_market: Decimal,
    pub regular: Decimal,
    pub after_hours: Decimal,
    pub closed: Decimal,
}

impl MovementToleranceTable {
    pub fn tolerance_for(&self, session: Session) -> Decimal {
        match session {
            Session::PreMarket => self.pre_market,
            Session::Regular => self.regular,
            Session::AfterHours => self.after_hours,
            Session::Closed => self.closed,
        }
    }
}

impl Default for MovementToleranceTable {
    fn default() -> Self {
        Self {
            pre_market: dec!(10),
            regular: dec!(5),
            after_hours: dec!(10),
            closed: dec!(15),
        }
    }
}

/// Per-layer penalty weights subtracted from a bar's starting score of 100.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PenaltyWeights {
    pub ohlc_logic: u8,
    pub off_grid: u8,
    pub duplicate_timestamp: u8,
    pub non_monotonic: u8,
    pub excessive_movement: u8,
    pub zero_volume_out_of_session: u8,
    pub volume_outlier: u8,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            ohlc_logic: 100,
            off_grid: 20,
            duplicate_timestamp: 40,
            non_monotonic: 40,
            excessive_movement: 10,
            zero_volume_out_of_session: 5,
            volume_outlier: 3,
        }
    }
}

/// Configuration for [`crate::validator::BarValidator`] (§4.4).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidatorConfig {
    pub acceptance_threshold: u8,
    pub penalty_weights: PenaltyWeights,
    pub movement_tolerance: MovementToleranceTable,
    /// Rolling window size for the price-movement standard-deviation check.
    pub movement_window: usize,
    /// Standard-deviation multiplier beyond which a move raises WARN.
    pub movement_std_dev_multiplier: Decimal,
    /// Rolling window size for the volume-outlier median check.
    pub volume_window: usize,
    /// Multiplier of the rolling median volume beyond which a bar is an
    /// outlier.
    pub volume_outlier_multiplier: Decimal,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: dna_instrument::quality::DEFAULT_ACCEPTANCE_THRESHOLD,
            penalty_weights: PenaltyWeights::default(),
            movement_tolerance: MovementToleranceTable::default(),
            movement_window: 50,
            movement_std_dev_multiplier: dec!(8),
            volume_window: 50,
            volume_outlier_multiplier: dec!(20),
        }
    }
}
