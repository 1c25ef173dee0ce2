use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// One of the five grids the pipeline understands.
///
/// Grid alignment and session boundaries are expressed in exchange-local
/// time; callers are expected to convert before calling into this module
/// (the core persists UTC and treats "exchange local" as the caller's
/// chosen `TimeZone`, per §6 of the design).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[display("1m")]
    M1,
    #[display("15m")]
    M15,
    #[display("1h")]
    H1,
    #[display("4h")]
    H4,
    #[display("1d")]
    D1,
}

const PRE_MARKET_START: (u32, u32) = (4, 0);
const REGULAR_START: (u32, u32) = (9, 30);
const REGULAR_SIMULATION_START: (u32, u32) = (9, 45);
const REGULAR_END: (u32, u32) = (16, 0);
const AFTER_HOURS_END: (u32, u32) = (20, 0);

impl Timeframe {
    /// Bar duration.
    pub fn duration(self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }

    /// True if `timestamp` falls exactly on this timeframe's canonical grid,
    /// in the given exchange-local zone.
    pub fn on_grid<Tz: TimeZone>(self, timestamp: DateTime<Tz>) -> bool {
        match self {
            Timeframe::M1 => timestamp.second() == 0 && timestamp.nanosecond() == 0,
            Timeframe::M15 => {
                timestamp.second() == 0
                    && timestamp.nanosecond() == 0
                    && timestamp.minute() % 15 == 0
            }
            Timeframe::H1 => {
                timestamp.second() == 0 && timestamp.nanosecond() == 0 && timestamp.minute() == 0
            }
            Timeframe::H4 => {
                timestamp.second() == 0
                    && timestamp.nanosecond() == 0
                    && timestamp.minute() == 0
                    && timestamp.hour() % 4 == 0
            }
            Timeframe::D1 => {
                timestamp.second() == 0
                    && timestamp.nanosecond() == 0
                    && timestamp.minute() == 0
                    && timestamp.hour() == 0
            }
        }
    }

    /// Classifies `timestamp` (exchange-local) into a trading session.
    ///
    /// Boundary policy is start-inclusive, end-exclusive per §8: a bar
    /// exactly on `REGULAR_START` is `Regular`, one exactly on `REGULAR_END`
    /// is `AfterHours`.
    pub fn session_of<Tz: TimeZone>(self, timestamp: DateTime<Tz>) -> Session {
        let t = timestamp.time();
        let pre = NaiveTime::from_hms_opt(PRE_MARKET_START.0, PRE_MARKET_START.1, 0).unwrap();
        let reg_start = NaiveTime::from_hms_opt(REGULAR_START.0, REGULAR_START.1, 0).unwrap();
        let reg_end = NaiveTime::from_hms_opt(REGULAR_END.0, REGULAR_END.1, 0).unwrap();
        let after_end = NaiveTime::from_hms_opt(AFTER_HOURS_END.0, AFTER_HOURS_END.1, 0).unwrap();

        if t >= pre && t < reg_start {
            Session::PreMarket
        } else if t >= reg_start && t < reg_end {
            Session::Regular
        } else if t >= reg_end && t < after_end {
            Session::AfterHours
        } else {
            Session::Closed
        }
    }

    /// True if `timestamp` is within the simulation entry window (§4.8,
    /// default 09:45-16:00 exchange local).
    pub fn in_simulation_window<Tz: TimeZone>(self, timestamp: DateTime<Tz>) -> bool {
        let t = timestamp.time();
        let start =
            NaiveTime::from_hms_opt(REGULAR_SIMULATION_START.0, REGULAR_SIMULATION_START.1, 0)
                .unwrap();
        let end = NaiveTime::from_hms_opt(REGULAR_END.0, REGULAR_END.1, 0).unwrap();
        t >= start && t < end
    }

    /// True once `timestamp` reaches the forced-close cutoff: `offset`
    /// minutes before after-hours ends (§4.8, default 30 minutes before
    /// 20:00 exchange local).
    pub fn is_force_close_bar<Tz: TimeZone>(self, timestamp: DateTime<Tz>, offset: Duration) -> bool {
        let after_end = NaiveTime::from_hms_opt(AFTER_HOURS_END.0, AFTER_HOURS_END.1, 0).unwrap();
        let cutoff = after_end - offset;
        timestamp.time() >= cutoff
    }

    /// Expected bar count within a single REGULAR session, used for gap
    /// detection. Timeframes coarser than 1d are expected once per session
    /// day.
    pub fn expected_bars_per_regular_session(self) -> u32 {
        match self {
            Timeframe::M1 => 390,
            Timeframe::M15 => 26,
            Timeframe::H1 => 7,
            Timeframe::H4 => 2,
            Timeframe::D1 => 1,
        }
    }

    /// Rounds `from` down to the nearest grid point at or before `from`.
    pub fn floor_to_grid(self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeframe::M1 => from
                .with_second(0)
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(from),
            Timeframe::M15 => {
                let minute = (from.minute() / 15) * 15;
                from.with_minute(minute)
                    .and_then(|d| d.with_second(0))
                    .and_then(|d| d.with_nanosecond(0))
                    .unwrap_or(from)
            }
            Timeframe::H1 => from
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(from),
            Timeframe::H4 => {
                let hour = (from.hour() / 4) * 4;
                from.with_hour(hour)
                    .and_then(|d| d.with_minute(0))
                    .and_then(|d| d.with_second(0))
                    .and_then(|d| d.with_nanosecond(0))
                    .unwrap_or(from)
            }
            Timeframe::D1 => from
                .with_hour(0)
                .and_then(|d| d.with_minute(0))
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(from),
        }
    }

    /// Enumerates every grid-aligned timestamp in `[from, to)`.
    pub fn grid_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let step = self.duration();
        let mut cursor = self.floor_to_grid(from);
        if cursor < from {
            cursor += step;
        }
        let mut out = Vec::new();
        while cursor < to {
            out.push(cursor);
            cursor += step;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn m1_grid_detection() {
        let on = Utc.with_ymd_and_hms(2024, 3, 4, 14, 31, 0).unwrap();
        let off = Utc.with_ymd_and_hms(2024, 3, 4, 14, 31, 30).unwrap();
        assert!(Timeframe::M1.on_grid(on));
        assert!(!Timeframe::M1.on_grid(off));
    }

    #[test]
    fn session_boundary_is_start_inclusive_end_exclusive() {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 4, 16, 0, 0).unwrap();
        assert_eq!(Timeframe::M1.session_of(start), Session::Regular);
        assert_eq!(Timeframe::M1.session_of(end), Session::AfterHours);
    }

    #[test]
    fn force_close_cutoff_is_thirty_minutes_before_after_hours_end_by_default() {
        let before = Utc.with_ymd_and_hms(2024, 3, 4, 19, 29, 0).unwrap();
        let at_cutoff = Utc.with_ymd_and_hms(2024, 3, 4, 19, 30, 0).unwrap();
        let offset = Duration::minutes(30);
        assert!(!Timeframe::M1.is_force_close_bar(before, offset));
        assert!(Timeframe::M1.is_force_close_bar(at_cutoff, offset));
    }

    #[test]
    fn grid_between_is_adjacent_and_exclusive_of_end() {
        let from = Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 4, 9, 33, 0).unwrap();
        let grid = Timeframe::M1.grid_between(from, to);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], from);
        assert_eq!(grid[2], Utc.with_ymd_and_hms(2024, 3, 4, 9, 32, 0).unwrap());
    }
}
