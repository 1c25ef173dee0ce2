use dna_instrument::{Bar, IssueCode, QualityIssue, Severity};
use serde::{Deserialize, Serialize};

/// Which side to re-fetch when a coarser bar and its covering finer bars
/// disagree. Not named directly by the distilled quality model, but
/// needed once cross-timeframe mismatches are detected: the Storage
/// Engine needs to know which request to re-issue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum RefetchPolicy {
    /// Re-fetch the coarser bar. Usually correct: broker historical-bars
    /// aggregation is the more failure-prone side.
    RefetchCoarser,
    /// Re-fetch the covering finer bars instead.
    RefetchFiner,
    /// Flag the mismatch and take no corrective action.
    None,
}

impl Default for RefetchPolicy {
    fn default() -> Self {
        Self::RefetchCoarser
    }
}

/// Which side a [`CrossTfMismatch`] recommends re-fetching.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RefetchTarget {
    Coarser,
    Finer,
    None,
}

/// A detected disagreement between a coarser bar and its covering finer
/// bars, per §4.5.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTfMismatch {
    pub issue: QualityIssue,
    pub refetch: RefetchTarget,
}

/// The Cross-Timeframe Validator from §4.5.
#[derive(Debug, Default)]
pub struct CrossTfValidator {
    policy: RefetchPolicy,
}

impl CrossTfValidator {
    pub fn new(policy: RefetchPolicy) -> Self {
        Self { policy }
    }

    /// Verifies the aggregation identity between `coarse` and the finer
    /// bars that cover it exactly (already ordered chronologically and
    /// already filtered to the ones within `coarse`'s window by the
    /// caller). Returns `None` when `finer` is empty, since there is
    /// nothing to reconcile against yet.
    pub fn check(&self, coarse: &Bar, finer: &[Bar]) -> Option<CrossTfMismatch> {
        let first = finer.first()?;
        let last = finer.last()?;

        let expected_high = finer.iter().map(|b| b.high).max()?;
        let expected_low = finer.iter().map(|b| b.low).min()?;
        let expected_volume: rust_decimal::Decimal = finer.iter().map(|b| b.volume).sum();

        let mismatched = coarse.open != first.open
            || coarse.close != last.close
            || coarse.high != expected_high
            || coarse.low != expected_low
            || coarse.volume != expected_volume;

        if !mismatched {
            return None;
        }

        let refetch = match self.policy {
            RefetchPolicy::RefetchCoarser => RefetchTarget::Coarser,
            RefetchPolicy::RefetchFiner => RefetchTarget::Finer,
            RefetchPolicy::None => RefetchTarget::None,
        };

        Some(CrossTfMismatch {
            issue: QualityIssue::new(
                IssueCode::CrossTfInconsistent,
                Severity::Warn,
                format!(
                    "{} {} at {} disagrees with its {} covering bars",
                    coarse.symbol,
                    coarse.timeframe,
                    coarse.timestamp,
                    finer.len()
                ),
            ),
            refetch,
        })
    }
}
