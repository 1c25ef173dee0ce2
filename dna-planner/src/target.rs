use std::ops::Range;

use chrono::{DateTime, Utc};
use dna_instrument::{Symbol, Timeframe};

/// One (symbol, timeframe, range) the Batch Planner is asked to cover
/// (§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTarget {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl FetchTarget {
    pub fn new(symbol: Symbol, timeframe: Timeframe, range: Range<DateTime<Utc>>) -> Self {
        Self {
            symbol,
            timeframe,
            from: range.start,
            to: range.end,
        }
    }

    pub fn range(&self) -> Range<DateTime<Utc>> {
        self.from..self.to
    }
}
