use std::collections::VecDeque;

use dna_instrument::{Bar, Session};
use rust_decimal::{Decimal, MathematicalOps};

/// Simple moving average (§4.7 `SMA`).
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
}

impl Sma {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1) as usize,
            values: VecDeque::new(),
            sum: Decimal::ZERO,
        }
    }

    pub fn update(&mut self, close: Decimal) -> (Decimal, bool) {
        self.values.push_back(close);
        self.sum += close;
        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        let valid = self.values.len() >= self.period;
        let value = self.sum / Decimal::from(self.values.len() as u64);
        (value, valid)
    }
}

/// Exponential moving average (§4.7 `EMA`).
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: Decimal,
    value: Option<Decimal>,
    seen: usize,
}

impl Ema {
    pub fn new(period: u32) -> Self {
        let period = period.max(1);
        Self {
            period: period as usize,
            multiplier: Decimal::TWO / Decimal::from(u64::from(period) + 1),
            value: None,
            seen: 0,
        }
    }

    pub fn update(&mut self, close: Decimal) -> (Decimal, bool) {
        self.seen += 1;
        let next = match self.value {
            Some(prev) => (close - prev) * self.multiplier + prev,
            None => close,
        };
        self.value = Some(next);
        (next, self.seen >= self.period)
    }
}

/// Wilder's RSI (§4.7 `RSI`).
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<Decimal>,
    avg_gain: Decimal,
    avg_loss: Decimal,
    count: usize,
}

impl Rsi {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1) as usize,
            prev_close: None,
            avg_gain: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            count: 0,
        }
    }

    pub fn update(&mut self, close: Decimal) -> (Decimal, bool) {
        let Some(prev) = self.prev_close.replace(close) else {
            return (Decimal::ZERO, false);
        };

        let change = close - prev;
        let gain = change.max(Decimal::ZERO);
        let loss = (-change).max(Decimal::ZERO);
        self.count += 1;
        let period_dec = Decimal::from(self.period as u64);

        if self.count <= self.period {
            self.avg_gain += gain / period_dec;
            self.avg_loss += loss / period_dec;
        } else {
            self.avg_gain = (self.avg_gain * (period_dec - Decimal::ONE) + gain) / period_dec;
            self.avg_loss = (self.avg_loss * (period_dec - Decimal::ONE) + loss) / period_dec;
        }

        let valid = self.count >= self.period;
        if !valid {
            return (Decimal::ZERO, false);
        }
        if self.avg_loss.is_zero() {
            return (Decimal::ONE_HUNDRED, true);
        }
        let rs = self.avg_gain / self.avg_loss;
        let rsi = Decimal::ONE_HUNDRED - (Decimal::ONE_HUNDRED / (Decimal::ONE + rs));
        (rsi, true)
    }
}

/// MACD (§4.7 `MACD`). The family emits a single scalar per bar; this
/// engine reports the MACD line itself (`fast_ema - slow_ema`), still
/// feeding the signal EMA internally so warmup accounts for it.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    slow_period: usize,
    signal_period: usize,
    count: usize,
}

impl Macd {
    pub fn new(fast: u32, slow: u32, signal: u32) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
            slow_period: slow.max(1) as usize,
            signal_period: signal.max(1) as usize,
            count: 0,
        }
    }

    pub fn update(&mut self, close: Decimal) -> (Decimal, bool) {
        self.count += 1;
        let (fast_value, _) = self.fast.update(close);
        let (slow_value, _) = self.slow.update(close);
        let macd_line = fast_value - slow_value;
        self.signal.update(macd_line);
        let valid = self.count >= self.slow_period + self.signal_period;
        (macd_line, valid)
    }
}

/// Bollinger Bands (§4.7 `BollingerBands`). Reports `%B`, the close's
/// position within the band (0 = lower band, 1 = upper band).
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: Decimal,
    values: VecDeque<Decimal>,
}

impl BollingerBands {
    pub fn new(period: u32, std_dev_bps: u32) -> Self {
        Self {
            period: period.max(1) as usize,
            std_dev_multiplier: Decimal::from(std_dev_bps) / Decimal::from(10_000u32),
            values: VecDeque::new(),
        }
    }

    pub fn update(&mut self, close: Decimal) -> (Decimal, bool) {
        self.values.push_back(close);
        if self.values.len() > self.period {
            self.values.pop_front();
        }

        let n = Decimal::from(self.values.len() as u64);
        let mean = self.values.iter().sum::<Decimal>() / n;
        let variance = self
            .values
            .iter()
            .map(|v| {
                let diff = *v - mean;
                diff * diff
            })
            .sum::<Decimal>()
            / n;
        let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);

        let upper = mean + std_dev * self.std_dev_multiplier;
        let lower = mean - std_dev * self.std_dev_multiplier;
        let percent_b = if upper == lower {
            Decimal::new(5, 1)
        } else {
            (close - lower) / (upper - lower)
        };

        (percent_b, self.values.len() >= self.period)
    }
}

/// Wilder's ATR (§4.7 `ATR`).
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<Decimal>,
    avg_tr: Decimal,
    count: usize,
}

impl Atr {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1) as usize,
            prev_close: None,
            avg_tr: Decimal::ZERO,
            count: 0,
        }
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> (Decimal, bool) {
        let true_range = match self.prev_close {
            Some(prev) => (high - low)
                .max((high - prev).abs())
                .max((low - prev).abs()),
            None => high - low,
        };
        self.prev_close = Some(close);
        self.count += 1;
        let period_dec = Decimal::from(self.period as u64);

        if self.count <= self.period {
            self.avg_tr += true_range / period_dec;
        } else {
            self.avg_tr = (self.avg_tr * (period_dec - Decimal::ONE) + true_range) / period_dec;
        }

        (self.avg_tr, self.count >= self.period)
    }
}

/// Stochastic oscillator (§4.7 `Stochastic`). Reports the slowed `%K`.
#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
    slowing: usize,
    highs: VecDeque<Decimal>,
    lows: VecDeque<Decimal>,
    raw_k: VecDeque<Decimal>,
}

impl Stochastic {
    pub fn new(k_period: u32, d_period: u32, slowing: u32) -> Self {
        Self {
            k_period: k_period.max(1) as usize,
            d_period: d_period.max(1) as usize,
            slowing: slowing.max(1) as usize,
            highs: VecDeque::new(),
            lows: VecDeque::new(),
            raw_k: VecDeque::new(),
        }
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> (Decimal, bool) {
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > self.k_period {
            self.highs.pop_front();
            self.lows.pop_front();
        }

        let highest = self.highs.iter().copied().fold(Decimal::MIN, Decimal::max);
        let lowest = self.lows.iter().copied().fold(Decimal::MAX, Decimal::min);
        let raw_k = if highest == lowest {
            Decimal::new(500, 1)
        } else {
            (close - lowest) / (highest - lowest) * Decimal::ONE_HUNDRED
        };

        self.raw_k.push_back(raw_k);
        if self.raw_k.len() > self.slowing {
            self.raw_k.pop_front();
        }
        let slowed_k = self.raw_k.iter().sum::<Decimal>() / Decimal::from(self.raw_k.len() as u64);

        let valid =
            self.highs.len() >= self.k_period && self.raw_k.len() >= self.slowing && {
                // %D would additionally need `d_period` slowed-K samples; the
                // engine reports %K only, so validity tracks %K's own warmup.
                let _ = self.d_period;
                true
            };

        (slowed_k, valid)
    }
}

/// Volume-weighted average price (§4.7 `VWAP`). When `session_reset` is
/// set, the running sums reset at the first bar of each new session.
#[derive(Debug, Clone)]
pub struct Vwap {
    session_reset: bool,
    cumulative_pv: Decimal,
    cumulative_volume: Decimal,
    current_session: Option<Session>,
}

impl Vwap {
    pub fn new(session_reset: bool) -> Self {
        Self {
            session_reset,
            cumulative_pv: Decimal::ZERO,
            cumulative_volume: Decimal::ZERO,
            current_session: None,
        }
    }

    pub fn update(&mut self, bar: &Bar) -> (Decimal, bool) {
        let session = bar.timeframe.session_of(bar.timestamp);
        if self.session_reset && self.current_session.is_some_and(|s| s != session) {
            self.cumulative_pv = Decimal::ZERO;
            self.cumulative_volume = Decimal::ZERO;
        }
        self.current_session = Some(session);

        let typical_price = (bar.high + bar.low + bar.close) / Decimal::from(3u32);
        self.cumulative_pv += typical_price * bar.volume;
        self.cumulative_volume += bar.volume;

        if self.cumulative_volume.is_zero() {
            (Decimal::ZERO, false)
        } else {
            (self.cumulative_pv / self.cumulative_volume, true)
        }
    }
}

/// On-balance volume (§4.7 `OBV`).
#[derive(Debug, Clone, Default)]
pub struct Obv {
    prev_close: Option<Decimal>,
    running_total: Decimal,
}

impl Obv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, close: Decimal, volume: Decimal) -> (Decimal, bool) {
        let Some(prev) = self.prev_close.replace(close) else {
            return (Decimal::ZERO, false);
        };
        if close > prev {
            self.running_total += volume;
        } else if close < prev {
            self.running_total -= volume;
        }
        (self.running_total, true)
    }
}

/// Wilder's ADX (§4.7 `ADX`): directional movement smoothed twice, once
/// for `+DI`/`-DI` and once more for the `ADX` line itself.
#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    prev_high: Option<Decimal>,
    prev_low: Option<Decimal>,
    prev_close: Option<Decimal>,
    avg_plus_dm: Decimal,
    avg_minus_dm: Decimal,
    avg_tr: Decimal,
    avg_dx: Decimal,
    count: usize,
}

impl Adx {
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1) as usize,
            prev_high: None,
            prev_low: None,
            prev_close: None,
            avg_plus_dm: Decimal::ZERO,
            avg_minus_dm: Decimal::ZERO,
            avg_tr: Decimal::ZERO,
            avg_dx: Decimal::ZERO,
            count: 0,
        }
    }

    pub fn update(&mut self, high: Decimal, low: Decimal, close: Decimal) -> (Decimal, bool) {
        let (Some(prev_high), Some(prev_low), Some(prev_close)) =
            (self.prev_high, self.prev_low, self.prev_close)
        else {
            self.prev_high = Some(high);
            self.prev_low = Some(low);
            self.prev_close = Some(close);
            return (Decimal::ZERO, false);
        };

        let up_move = high - prev_high;
        let down_move = prev_low - low;
        let plus_dm = if up_move > down_move && up_move > Decimal::ZERO {
            up_move
        } else {
            Decimal::ZERO
        };
        let minus_dm = if down_move > up_move && down_move > Decimal::ZERO {
            down_move
        } else {
            Decimal::ZERO
        };
        let true_range = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        self.prev_high = Some(high);
        self.prev_low = Some(low);
        self.prev_close = Some(close);
        self.count += 1;
        let period_dec = Decimal::from(self.period as u64);

        if self.count <= self.period {
            self.avg_plus_dm += plus_dm / period_dec;
            self.avg_minus_dm += minus_dm / period_dec;
            self.avg_tr += true_range / period_dec;
        } else {
            self.avg_plus_dm = (self.avg_plus_dm * (period_dec - Decimal::ONE) + plus_dm) / period_dec;
            self.avg_minus_dm =
                (self.avg_minus_dm * (period_dec - Decimal::ONE) + minus_dm) / period_dec;
            self.avg_tr = (self.avg_tr * (period_dec - Decimal::ONE) + true_range) / period_dec;
        }

        if self.avg_tr.is_zero() {
            return (Decimal::ZERO, false);
        }
        let plus_di = self.avg_plus_dm / self.avg_tr * Decimal::ONE_HUNDRED;
        let minus_di = self.avg_minus_dm / self.avg_tr * Decimal::ONE_HUNDRED;
        let di_sum = plus_di + minus_di;
        let dx = if di_sum.is_zero() {
            Decimal::ZERO
        } else {
            (plus_di - minus_di).abs() / di_sum * Decimal::ONE_HUNDRED
        };

        if self.count <= self.period {
            self.avg_dx += dx / period_dec;
        } else {
            self.avg_dx = (self.avg_dx * (period_dec - Decimal::ONE) + dx) / period_dec;
        }

        (self.avg_dx, self.count >= self.period * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_is_not_valid_until_window_fills() {
        let mut sma = Sma::new(3);
        assert!(!sma.update(dec!(1)).1);
        assert!(!sma.update(dec!(2)).1);
        let (value, valid) = sma.update(dec!(3));
        assert!(valid);
        assert_eq!(value, dec!(2));
    }

    #[test]
    fn ema_seeds_from_first_value() {
        let mut ema = Ema::new(2);
        let (value, _) = ema.update(dec!(10));
        assert_eq!(value, dec!(10));
    }

    #[test]
    fn rsi_is_100_when_there_are_no_losses() {
        let mut rsi = Rsi::new(3);
        rsi.update(dec!(10));
        rsi.update(dec!(11));
        rsi.update(dec!(12));
        let (value, valid) = rsi.update(dec!(13));
        assert!(valid);
        assert_eq!(value, dec!(100));
    }

    #[test]
    fn obv_accumulates_volume_on_up_days() {
        let mut obv = Obv::new();
        obv.update(dec!(10), dec!(100));
        let (value, valid) = obv.update(dec!(11), dec!(50));
        assert!(valid);
        assert_eq!(value, dec!(50));
    }

    #[test]
    fn deterministic_replay_yields_identical_sma_values() {
        let inputs = [dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        let run = || {
            let mut sma = Sma::new(2);
            inputs.iter().map(|v| sma.update(*v)).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
