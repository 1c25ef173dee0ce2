use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::symbol::Symbol;
use crate::timeframe::Timeframe;

/// Origin of a [`Bar`]: which upstream request produced it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum BarSource {
    Historical,
    MarketData,
}

/// Errors raised when attempting to construct a [`Bar`] that would violate
/// the OHLCV invariant from §3.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BarConstructError {
    #[error("low ({low}) exceeds min(open, close) ({min_oc})")]
    LowAboveBody { low: Decimal, min_oc: Decimal },
    #[error("high ({high}) is below max(open, close) ({max_oc})")]
    HighBelowBody { high: Decimal, max_oc: Decimal },
    #[error("volume is negative: {0}")]
    NegativeVolume(Decimal),
}

/// Uniquely identifies a stored [`Bar`] row: the storage primary key (§4.6).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor)]
pub struct BarKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
}

/// The atomic OHLCV unit described by §3. Constructing a [`Bar`] always
/// checks the `low <= min(open, close) <= max(open, close) <= high` and
/// `volume >= 0` invariants; there is no way to build an invalid one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub source: BarSource,
    pub ingested_at: DateTime<Utc>,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        source: BarSource,
        ingested_at: DateTime<Utc>,
    ) -> Result<Self, BarConstructError> {
        let min_oc = open.min(close);
        let max_oc = open.max(close);

        if low > min_oc {
            return Err(BarConstructError::LowAboveBody { low, min_oc });
        }
        if high < max_oc {
            return Err(BarConstructError::HighBelowBody { high, max_oc });
        }
        if volume < Decimal::ZERO {
            return Err(BarConstructError::NegativeVolume(volume));
        }

        Ok(Self {
            symbol,
            timeframe,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            source,
            ingested_at,
        })
    }

    pub fn key(&self) -> BarKey {
        BarKey::new(self.symbol.clone(), self.timeframe, self.timestamp)
    }

    /// Percent change of `close` relative to `other.close`, signed.
    pub fn pct_change_from(&self, other: &Bar) -> Decimal {
        if other.close.is_zero() {
            return Decimal::ZERO;
        }
        (self.close - other.close) / other.close * Decimal::ONE_HUNDRED
    }
}
