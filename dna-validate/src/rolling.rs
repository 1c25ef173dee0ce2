use std::collections::VecDeque;

use rust_decimal::{Decimal, MathematicalOps};

/// Fixed-size rolling window over `Decimal` samples, used by the Price
/// Movement and Volume Correlation layers (§4.4) to compute a standard
/// deviation and median without re-scanning storage.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    samples: VecDeque<Decimal>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: Decimal) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Decimal {
        if self.samples.is_empty() {
            return Decimal::ZERO;
        }
        self.samples.iter().sum::<Decimal>() / Decimal::from(self.samples.len() as u64)
    }

    pub fn std_dev(&self) -> Decimal {
        if self.samples.len() < 2 {
            return Decimal::ZERO;
        }
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|v| {
                let diff = *v - mean;
                diff * diff
            })
            .sum::<Decimal>()
            / Decimal::from(self.samples.len() as u64);
        variance.sqrt().unwrap_or(Decimal::ZERO)
    }

    pub fn median(&self) -> Decimal {
        if self.samples.is_empty() {
            return Decimal::ZERO;
        }
        let mut sorted: Vec<Decimal> = self.samples.iter().copied().collect();
        sorted.sort();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / Decimal::TWO
        } else {
            sorted[mid]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut window = RollingWindow::new(3);
        window.push(dec!(1));
        window.push(dec!(2));
        window.push(dec!(3));
        window.push(dec!(4));
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean(), dec!(3));
    }

    #[test]
    fn median_of_even_count() {
        let mut window = RollingWindow::new(4);
        for v in [dec!(1), dec!(2), dec!(3), dec!(4)] {
            window.push(v);
        }
        assert_eq!(window.median(), dec!(2.5));
    }
}
