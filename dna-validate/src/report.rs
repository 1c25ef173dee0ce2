use std::collections::HashMap;

use dna_instrument::{Bar, IssueCode, QualityReport, Severity};
use serde::{Deserialize, Serialize};

/// One bar's validation outcome within a [`BatchValidationResult`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoredBar {
    pub bar: Bar,
    pub report: QualityReport,
    pub accepted: bool,
}

/// Aggregate counts across a batch, by issue code and by severity, per
/// §4.4's "aggregate report (counts by code and severity)".
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AggregateReport {
    pub by_code: HashMap<IssueCode, u32>,
    pub by_severity: HashMap<Severity, u32>,
    pub bars_scored: u32,
    pub bars_accepted: u32,
    pub bars_rejected: u32,
}

impl AggregateReport {
    pub fn record(&mut self, scored: &ScoredBar) {
        self.bars_scored += 1;
        if scored.accepted {
            self.bars_accepted += 1;
        } else {
            self.bars_rejected += 1;
        }
        for issue in &scored.report.issues {
            *self.by_code.entry(issue.code).or_insert(0) += 1;
            *self.by_severity.entry(issue.severity).or_insert(0) += 1;
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.bars_scored == 0 {
            return 1.0;
        }
        f64::from(self.bars_accepted) / f64::from(self.bars_scored)
    }
}

/// Result of validating an entire batch of bars: the per-bar scores plus
/// the batch-wide aggregate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BatchValidationResult {
    pub scored: Vec<ScoredBar>,
    pub aggregate: AggregateReport,
}

impl BatchValidationResult {
    pub fn push(&mut self, bar: Bar, report: QualityReport, accepted: bool) {
        let scored = ScoredBar {
            bar,
            report,
            accepted,
        };
        self.aggregate.record(&scored);
        self.scored.push(scored);
    }

    pub fn accepted_bars(&self) -> impl Iterator<Item = &Bar> {
        self.scored.iter().filter(|s| s.accepted).map(|s| &s.bar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use dna_instrument::{BarSource, Symbol, Timeframe};
    use rust_decimal_macros::dec;

    #[test]
    fn aggregate_counts_by_code_and_severity() {
        let mut result = BatchValidationResult::default();
        let bar = Bar::new(
            Symbol::from("AAPL"),
            Timeframe::M1,
            DateTime::UNIX_EPOCH,
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
            dec!(1000),
            BarSource::Historical,
            DateTime::UNIX_EPOCH,
        )
        .unwrap();
        let mut report = QualityReport::perfect();
        report.push(
            dna_instrument::QualityIssue::new(IssueCode::VolumeOutlier, Severity::Info, "spike"),
            3,
        );
        result.push(bar, report, true);

        assert_eq!(result.aggregate.bars_scored, 1);
        assert_eq!(result.aggregate.bars_accepted, 1);
        assert_eq!(result.aggregate.by_code[&IssueCode::VolumeOutlier], 1);
        assert_eq!(result.aggregate.by_severity[&Severity::Info], 1);
    }
}
