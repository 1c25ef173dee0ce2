use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dna_instrument::{Bar, IssueCode, QualityIssue, Session, Severity};

use crate::config::PenaltyWeights;

/// Layer 2 (§4.4): time-series shape. Tracks, per (symbol, timeframe), the
/// timestamps already seen in the current validation pass and the last
/// timestamp admitted, so duplicates and monotonicity can be checked
/// incrementally as bars stream through.
#[derive(Debug, Default, Clone)]
pub struct TimeSeriesState {
    seen: HashSet<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl TimeSeriesState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `bar` against the grid, the duplicate set and monotonic
    /// ordering, then records it. Also classifies the bar's session, which
    /// the movement and volume layers need.
    pub fn check(&mut self, bar: &Bar) -> (Session, Vec<QualityIssue>) {
        let mut issues = Vec::new();
        let session = bar.timeframe.session_of(bar.timestamp);

        if !bar.timeframe.on_grid(bar.timestamp) {
            issues.push(QualityIssue::new(
                IssueCode::OffGrid,
                Severity::Warn,
                format!(
                    "timestamp {} is not aligned to the {} grid",
                    bar.timestamp, bar.timeframe
                ),
            ));
        }

        if !self.seen.insert(bar.timestamp) {
            issues.push(QualityIssue::new(
                IssueCode::DuplicateTimestamp,
                Severity::Error,
                format!(
                    "duplicate timestamp {} for {} {}",
                    bar.timestamp, bar.symbol, bar.timeframe
                ),
            ));
        }

        if let Some(last) = self.last_timestamp {
            if bar.timestamp < last {
                issues.push(QualityIssue::new(
                    IssueCode::NonMonotonic,
                    Severity::Error,
                    format!("timestamp {} arrived after {last}", bar.timestamp),
                ));
            }
        }
        self.last_timestamp = Some(self.last_timestamp.map_or(bar.timestamp, |l| l.max(bar.timestamp)));

        (session, issues)
    }
}

/// Applies this layer's penalty weight for each issue it raised.
pub fn penalty_for(code: IssueCode, weights: &PenaltyWeights) -> u8 {
    match code {
        IssueCode::OffGrid => weights.off_grid,
        IssueCode::DuplicateTimestamp => weights.duplicate_timestamp,
        IssueCode::NonMonotonic => weights.non_monotonic,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_instrument::{BarSource, Symbol, Timeframe};
    use rust_decimal_macros::dec;

    fn bar_at(ts: DateTime<Utc>) -> Bar {
        Bar::new(
            Symbol::from("AAPL"),
            Timeframe::M1,
            ts,
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
            dec!(1000),
            BarSource::Historical,
            ts,
        )
        .unwrap()
    }

    #[test]
    fn flags_duplicate_timestamp() {
        let mut state = TimeSeriesState::new();
        let ts = DateTime::UNIX_EPOCH;
        let (_, first) = state.check(&bar_at(ts));
        assert!(first.is_empty());
        let (_, second) = state.check(&bar_at(ts));
        assert!(second.iter().any(|i| i.code == IssueCode::DuplicateTimestamp));
    }

    #[test]
    fn flags_non_monotonic_arrival() {
        let mut state = TimeSeriesState::new();
        let later = DateTime::UNIX_EPOCH + chrono::Duration::minutes(5);
        let earlier = DateTime::UNIX_EPOCH;
        state.check(&bar_at(later));
        let (_, issues) = state.check(&bar_at(earlier));
        assert!(issues.iter().any(|i| i.code == IssueCode::NonMonotonic));
    }

    #[test]
    fn flags_off_grid_timestamp() {
        let mut state = TimeSeriesState::new();
        let off = DateTime::UNIX_EPOCH + chrono::Duration::seconds(30);
        let (_, issues) = state.check(&bar_at(off));
        assert!(issues.iter().any(|i| i.code == IssueCode::OffGrid));
    }
}
