use dna_instrument::{Bar, ParamSet};
use rust_decimal::Decimal;

use crate::families::{Adx, Atr, BollingerBands, Ema, Macd, Obv, Rsi, Sma, Stochastic, Vwap};

/// One streaming indicator's state, dispatched by family. Advancing always
/// takes the full [`Bar`] even though most families only need `close`, so
/// every family can be added without changing the call site.
#[derive(Debug, Clone)]
pub enum IndicatorState {
    Sma(Sma),
    Ema(Ema),
    Rsi(Rsi),
    Macd(Macd),
    BollingerBands(BollingerBands),
    Atr(Atr),
    Stochastic(Stochastic),
    Vwap(Vwap),
    Obv(Obv),
    Adx(Adx),
}

impl IndicatorState {
    pub fn new(params: &ParamSet) -> Self {
        match *params {
            ParamSet::Sma { period } => Self::Sma(Sma::new(period)),
            ParamSet::Ema { period } => Self::Ema(Ema::new(period)),
            ParamSet::Rsi { period } => Self::Rsi(Rsi::new(period)),
            ParamSet::Macd { fast, slow, signal } => Self::Macd(Macd::new(fast, slow, signal)),
            ParamSet::BollingerBands {
                period,
                std_dev_bps,
            } => Self::BollingerBands(BollingerBands::new(period, std_dev_bps)),
            ParamSet::Atr { period } => Self::Atr(Atr::new(period)),
            ParamSet::Stochastic {
                k_period,
                d_period,
                slowing,
            } => Self::Stochastic(Stochastic::new(k_period, d_period, slowing)),
            ParamSet::Vwap { session_reset } => Self::Vwap(Vwap::new(session_reset)),
            ParamSet::Obv => Self::Obv(Obv::new()),
            ParamSet::Adx { period } => Self::Adx(Adx::new(period)),
        }
    }

    /// Advances this state with `bar`, returning the value and whether the
    /// underlying state has finished warming up.
    pub fn advance(&mut self, bar: &Bar) -> (Decimal, bool) {
        match self {
            Self::Sma(state) => state.update(bar.close),
            Self::Ema(state) => state.update(bar.close),
            Self::Rsi(state) => state.update(bar.close),
            Self::Macd(state) => state.update(bar.close),
            Self::BollingerBands(state) => state.update(bar.close),
            Self::Atr(state) => state.update(bar.high, bar.low, bar.close),
            Self::Stochastic(state) => state.update(bar.high, bar.low, bar.close),
            Self::Vwap(state) => state.update(bar),
            Self::Obv(state) => state.update(bar.close, bar.volume),
            Self::Adx(state) => state.update(bar.high, bar.low, bar.close),
        }
    }
}
