use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dna_instrument::{Session, Timeframe};
use serde::{Deserialize, Serialize};

/// Result of `detect_missing` (§4.6): timestamps the canonical grid expects
/// within a regular trading session but that the store does not have, plus
/// timestamps the store holds that fall off the grid entirely.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MissingReport {
    pub missing: Vec<DateTime<Utc>>,
    pub misaligned: Vec<DateTime<Utc>>,
}

/// Computes `detect_missing` given every timestamp already stored for
/// `(symbol, timeframe)` within `[from, to)`. Expected timestamps are the
/// timeframe's grid restricted to the REGULAR session, since that is the
/// only window with a well-known expected bar count (§4.7
/// `expected_bars_per_regular_session`); PRE/AFTER/CLOSED bars are
/// optional and never counted as missing.
pub fn detect_missing(
    timeframe: Timeframe,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    present: &HashSet<DateTime<Utc>>,
) -> MissingReport {
    let mut report = MissingReport::default();

    for ts in timeframe.grid_between(from, to) {
        if timeframe.session_of(ts) == Session::Regular && !present.contains(&ts) {
            report.missing.push(ts);
        }
    }

    for ts in present {
        if *ts >= from && *ts < to && !timeframe.on_grid(*ts) {
            report.misaligned.push(ts.to_owned());
        }
    }
    report.misaligned.sort();

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reports_regular_session_gaps_only() {
        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 9, 33, 0).unwrap();
        let present: HashSet<_> = [Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap()]
            .into_iter()
            .collect();

        let report = detect_missing(Timeframe::M1, from, to, &present);
        assert_eq!(report.missing.len(), 2);
        assert!(report.misaligned.is_empty());
    }

    #[test]
    fn off_grid_stored_timestamps_are_misaligned() {
        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 9, 32, 0).unwrap();
        let stray = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 30).unwrap();
        let present: HashSet<_> = [
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 31, 0).unwrap(),
            stray,
        ]
        .into_iter()
        .collect();

        let report = detect_missing(Timeframe::M1, from, to, &present);
        assert!(report.missing.is_empty());
        assert_eq!(report.misaligned, vec![stray]);
    }
}
