use chrono::Utc;
use dna_instrument::{Bar, ExitReason, Outcome, SimulationLabel};
use tracing::debug;

use crate::config::SimulationConfig;
use crate::tie_break::TieBreakPolicy;

/// The Trade Simulator from §4.8: a fixed LONG entry anchored at `entry_bar`,
/// advanced forward through `subsequent_bars` (same symbol and timeframe,
/// strictly later, chronologically ordered) until an exit condition fires.
#[derive(Debug, Default)]
pub struct TradeSimulator {
    config: SimulationConfig,
}

impl TradeSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// True iff `bar` falls in the simulation entry window (§4.8, default
    /// 09:45-16:00 exchange local).
    pub fn is_entry_candidate(bar: &Bar) -> bool {
        bar.timeframe.in_simulation_window(bar.timestamp)
    }

    pub fn simulate(&self, entry_bar: &Bar, subsequent_bars: &[Bar]) -> SimulationLabel {
        let entry = entry_bar.open;
        let stop = self.config.stop.below(entry);
        let take = self.config.take.above(entry);
        let force_close_offset = self.config.force_close_offset();

        for (i, bar) in subsequent_bars.iter().enumerate() {
            let take_hit = bar.high >= take;
            let stop_hit = bar.low <= stop;

            let resolved = if take_hit && stop_hit {
                Some(match self.config.tie_break {
                    TieBreakPolicy::StopLoss => (ExitReason::StopLoss, stop),
                    TieBreakPolicy::TakeProfit => (ExitReason::TakeProfit, take),
                    TieBreakPolicy::Indeterminate => (ExitReason::Indeterminate, bar.close),
                })
            } else if take_hit {
                Some((ExitReason::TakeProfit, take))
            } else if stop_hit {
                Some((ExitReason::StopLoss, stop))
            } else {
                None
            };

            if let Some((reason, trigger_price)) = resolved {
                let fill_price = match reason {
                    ExitReason::TakeProfit | ExitReason::StopLoss => subsequent_bars
                        .get(i + 1)
                        .map(|next| next.open)
                        .unwrap_or(trigger_price),
                    _ => trigger_price,
                };
                debug!(symbol = %entry_bar.symbol, reason = %reason, bars_to_exit = i + 1, "trade exited");
                return self.label(entry_bar, entry, stop, take, bar, reason, Some(fill_price), i as u32 + 1);
            }

            if entry_bar
                .timeframe
                .is_force_close_bar(bar.timestamp, force_close_offset)
            {
                debug!(symbol = %entry_bar.symbol, "trade forced closed");
                return self.label(
                    entry_bar,
                    entry,
                    stop,
                    take,
                    bar,
                    ExitReason::ForcedClose,
                    Some(bar.close),
                    i as u32 + 1,
                );
            }
        }

        SimulationLabel {
            bar_ref: entry_bar.key(),
            entry_price: entry,
            stop_price: stop,
            take_price: take,
            shares: self.config.quantity,
            exit_bar_ref: None,
            exit_price: None,
            exit_reason: ExitReason::OpenAtSessionEnd,
            bars_to_exit: subsequent_bars.len() as u32,
            pnl: None,
            outcome: None,
            labeled_at: Utc::now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn label(
        &self,
        entry_bar: &Bar,
        entry: rust_decimal::Decimal,
        stop: rust_decimal::Decimal,
        take: rust_decimal::Decimal,
        exit_bar: &Bar,
        reason: ExitReason,
        exit_price: Option<rust_decimal::Decimal>,
        bars_to_exit: u32,
    ) -> SimulationLabel {
        let has_outcome = !matches!(
            reason,
            ExitReason::OpenAtSessionEnd | ExitReason::Indeterminate
        );
        let pnl = exit_price.filter(|_| has_outcome).map(|price| (price - entry) * self.config.quantity);
        let outcome = pnl.map(|pnl| {
            if pnl > rust_decimal::Decimal::ZERO {
                Outcome::Success
            } else {
                Outcome::Failure
            }
        });

        SimulationLabel {
            bar_ref: entry_bar.key(),
            entry_price: entry,
            stop_price: stop,
            take_price: take,
            shares: self.config.quantity,
            exit_bar_ref: Some(exit_bar.key()),
            exit_price,
            exit_reason: reason,
            bars_to_exit,
            pnl,
            outcome,
            labeled_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone};
    use dna_instrument::{BarSource, Symbol, Timeframe};
    use rust_decimal_macros::dec;

    fn bar(ts: DateTime<Utc>, open: rust_decimal::Decimal, high: rust_decimal::Decimal, low: rust_decimal::Decimal, close: rust_decimal::Decimal) -> Bar {
        Bar::new(
            Symbol::from("AAPL"),
            Timeframe::M1,
            ts,
            open,
            high,
            low,
            close,
            dec!(1000),
            BarSource::Historical,
            ts,
        )
        .unwrap()
    }

    fn entry_at(hm: (u32, u32)) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, hm.0, hm.1, 0).unwrap();
        bar(ts, dec!(100), dec!(100.2), dec!(99.8), dec!(100))
    }

    #[test]
    fn take_profit_fills_at_next_bar_open() {
        let simulator = TradeSimulator::new(SimulationConfig::default());
        let entry = entry_at((9, 45));
        let trigger_ts = entry.timestamp + Duration::minutes(1);
        let next_ts = trigger_ts + Duration::minutes(1);
        let subsequent = vec![
            bar(trigger_ts, dec!(100.3), dec!(100.6), dec!(100.2), dec!(100.5)),
            bar(next_ts, dec!(100.55), dec!(100.7), dec!(100.5), dec!(100.6)),
        ];

        let label = simulator.simulate(&entry, &subsequent);
        assert_eq!(label.exit_reason, ExitReason::TakeProfit);
        assert_eq!(label.exit_price, Some(dec!(100.55)));
        assert_eq!(label.outcome, Some(Outcome::Success));
    }

    #[test]
    fn both_crossed_same_bar_defaults_to_stop_loss() {
        let simulator = TradeSimulator::new(SimulationConfig::default());
        let entry = entry_at((9, 45));
        let trigger_ts = entry.timestamp + Duration::minutes(1);
        let subsequent = vec![bar(trigger_ts, dec!(100), dec!(101), dec!(99), dec!(100))];

        let label = simulator.simulate(&entry, &subsequent);
        assert_eq!(label.exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn forced_close_fires_at_the_configured_cutoff() {
        let simulator = TradeSimulator::new(SimulationConfig::default());
        let entry = entry_at((9, 45));
        let cutoff_ts = Utc.with_ymd_and_hms(2024, 3, 4, 19, 30, 0).unwrap();
        let subsequent = vec![bar(cutoff_ts, dec!(100), dec!(100.1), dec!(99.9), dec!(100.05))];

        let label = simulator.simulate(&entry, &subsequent);
        assert_eq!(label.exit_reason, ExitReason::ForcedClose);
        assert_eq!(label.exit_price, Some(dec!(100.05)));
    }

    #[test]
    fn no_trigger_before_range_end_is_open_at_session_end() {
        let simulator = TradeSimulator::new(SimulationConfig::default());
        let entry = entry_at((9, 45));
        let subsequent = vec![bar(
            entry.timestamp + Duration::minutes(1),
            dec!(100.01),
            dec!(100.05),
            dec!(99.97),
            dec!(100.02),
        )];

        let label = simulator.simulate(&entry, &subsequent);
        assert_eq!(label.exit_reason, ExitReason::OpenAtSessionEnd);
        assert!(label.outcome.is_none());
    }
}
