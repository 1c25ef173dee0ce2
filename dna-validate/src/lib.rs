#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Multi-Timeframe Validator (§4.4, §4.5): a four-layer bar quality
//! engine plus the cross-timeframe consistency check that aligns bars
//! across the grids they share.

pub mod config;
pub mod cross_tf;
pub mod movement;
pub mod ohlc;
pub mod report;
pub mod rolling;
pub mod timeseries;
pub mod validator;
pub mod volume;

pub use config::{MovementToleranceTable, PenaltyWeights, ValidatorConfig};
pub use cross_tf::{CrossTfMismatch, CrossTfValidator, RefetchPolicy, RefetchTarget};
pub use report::{AggregateReport, BatchValidationResult, ScoredBar};
pub use validator::BarValidator;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use dna_instrument::{Bar, BarSource, Symbol, Timeframe};
    use rust_decimal_macros::dec;

    #[test]
    fn streams_a_small_batch_into_an_aggregate_report() {
        let mut validator = BarValidator::new(ValidatorConfig::default());
        let mut result = BatchValidationResult::default();

        for i in 0..5 {
            let ts = DateTime::UNIX_EPOCH + Duration::minutes(i);
            let close = dec!(100) + rust_decimal::Decimal::from(i % 3);
            let bar = Bar::new(
                Symbol::from("AAPL"),
                Timeframe::M1,
                ts,
                close,
                close + dec!(0.5),
                close - dec!(0.5),
                close,
                dec!(1000),
                BarSource::Historical,
                ts,
            )
            .unwrap();
            let report = validator.validate(&bar);
            let accepted = validator.accepts(&report);
            result.push(bar, report, accepted);
        }

        assert_eq!(result.aggregate.bars_scored, 5);
        assert_eq!(result.aggregate.bars_accepted, 5);
    }
}
