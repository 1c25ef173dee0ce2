use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHasher;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bar::BarKey;

/// One parameterization of one of the ten recognized families (§4.7).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case", tag = "family")]
pub enum ParamSet {
    #[display("SMA({period})")]
    Sma { period: u32 },
    #[display("EMA({period})")]
    Ema { period: u32 },
    #[display("RSI({period})")]
    Rsi { period: u32 },
    #[display("MACD({fast},{slow},{signal})")]
    Macd { fast: u32, slow: u32, signal: u32 },
    #[display("BollingerBands({period},{std_dev_bps})")]
    BollingerBands { period: u32, std_dev_bps: u32 },
    #[display("ATR({period})")]
    Atr { period: u32 },
    #[display("Stochastic({k_period},{d_period},{slowing})")]
    Stochastic {
        k_period: u32,
        d_period: u32,
        slowing: u32,
    },
    #[display("VWAP(reset={session_reset})")]
    Vwap { session_reset: bool },
    #[display("OBV")]
    Obv,
    #[display("ADX({period})")]
    Adx { period: u32 },
}

impl ParamSet {
    pub fn family(&self) -> IndicatorFamily {
        match self {
            ParamSet::Sma { .. } => IndicatorFamily::Sma,
            ParamSet::Ema { .. } => IndicatorFamily::Ema,
            ParamSet::Rsi { .. } => IndicatorFamily::Rsi,
            ParamSet::Macd { .. } => IndicatorFamily::Macd,
            ParamSet::BollingerBands { .. } => IndicatorFamily::BollingerBands,
            ParamSet::Atr { .. } => IndicatorFamily::Atr,
            ParamSet::Stochastic { .. } => IndicatorFamily::Stochastic,
            ParamSet::Vwap { .. } => IndicatorFamily::Vwap,
            ParamSet::Obv => IndicatorFamily::Obv,
            ParamSet::Adx { .. } => IndicatorFamily::Adx,
        }
    }

    /// Stable fingerprint of this configuration, used as the third column
    /// of the `(bar_ref, family, parameters_fingerprint, value)` triple
    /// from §3 and §9.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.family().hash(&mut hasher);
        // `ParamSet`'s own Hash impl covers field values via the derive.
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// The ten families recognized by the Indicator Engine (§4.7).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorFamily {
    Sma,
    Ema,
    Rsi,
    Macd,
    BollingerBands,
    Atr,
    Stochastic,
    Vwap,
    Obv,
    Adx,
}

/// One computed value, keyed by the bar it was derived from, the family
/// and the parameter fingerprint (§3).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorValue {
    pub bar_ref: BarKey,
    pub family: IndicatorFamily,
    pub parameters_fingerprint: u64,
    pub value: Decimal,
    /// False while the underlying streaming state is still warming up
    /// (§7 `IndicatorWarmup`).
    pub valid: bool,
    pub computed_at: DateTime<Utc>,
}
