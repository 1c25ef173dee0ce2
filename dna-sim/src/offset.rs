use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a stop/take distance from entry is expressed (§4.8: "default 0.4%
/// of entry or $2.80 absolute, configured").
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PriceOffset {
    Absolute(Decimal),
    Percent(Decimal),
}

impl PriceOffset {
    /// Resolves the absolute distance from `entry` this offset represents.
    pub fn distance_from(&self, entry: Decimal) -> Decimal {
        match self {
            PriceOffset::Absolute(amount) => *amount,
            PriceOffset::Percent(pct) => entry * *pct / Decimal::ONE_HUNDRED,
        }
    }

    pub fn below(&self, entry: Decimal) -> Decimal {
        entry - self.distance_from(entry)
    }

    pub fn above(&self, entry: Decimal) -> Decimal {
        entry + self.distance_from(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percent_offset_scales_with_entry() {
        let offset = PriceOffset::Percent(dec!(0.5));
        assert_eq!(offset.above(dec!(100)), dec!(100.50));
    }

    #[test]
    fn absolute_offset_is_fixed() {
        let offset = PriceOffset::Absolute(dec!(2.80));
        assert_eq!(offset.below(dec!(100)), dec!(97.20));
    }
}
