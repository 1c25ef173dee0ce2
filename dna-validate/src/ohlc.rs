use dna_instrument::{Bar, IssueCode, QualityIssue, Severity};
use rust_decimal::Decimal;

/// Layer 1 (§4.4): OHLC logic. A [`Bar`] is constructed through
/// [`Bar::new`], which already enforces `low <= min(open,close) <=
/// max(open,close) <= high`, so this layer only has to catch the one
/// invariant a constructed `Bar` cannot violate by itself: negative
/// inputs that happened to cancel out, plus volume, are re-checked
/// defensively since bars can also arrive pre-built from storage.
pub fn check(bar: &Bar) -> Option<QualityIssue> {
    let min_oc = bar.open.min(bar.close);
    let max_oc = bar.open.max(bar.close);

    let violated = bar.low > min_oc
        || bar.high < max_oc
        || bar.low < Decimal::ZERO
        || bar.open < Decimal::ZERO
        || bar.high < Decimal::ZERO
        || bar.close < Decimal::ZERO
        || bar.volume < Decimal::ZERO;

    if !violated {
        return None;
    }

    Some(QualityIssue::new(
        IssueCode::OhlcLogic,
        Severity::Error,
        format!(
            "OHLCV invariant violated: open={} high={} low={} close={} volume={}",
            bar.open, bar.high, bar.low, bar.close, bar.volume
        ),
    ))
}
