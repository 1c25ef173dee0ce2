use dna_instrument::{Bar, IssueCode, QualityIssue, Session, Severity};
use rust_decimal::Decimal;

use crate::rolling::RollingWindow;

/// Layer 4 (§4.4): volume correlation. Tracks a rolling window of volumes
/// per (symbol, timeframe) to judge outliers against the trailing median.
#[derive(Debug, Clone)]
pub struct VolumeState {
    window: RollingWindow,
}

impl VolumeState {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: RollingWindow::new(window_size),
        }
    }

    pub fn check(&mut self, bar: &Bar, session: Session, outlier_multiplier: Decimal) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        let volume_expected = !matches!(session, Session::Closed | Session::PreMarket);
        if bar.volume.is_zero() && volume_expected {
            issues.push(QualityIssue::new(
                IssueCode::ZeroVolumeOutOfSession,
                Severity::Warn,
                format!("zero volume bar during {session} session"),
            ));
        }

        if !self.window.is_empty() {
            let median = self.window.median();
            if !median.is_zero() && bar.volume > median * outlier_multiplier {
                issues.push(QualityIssue::new(
                    IssueCode::VolumeOutlier,
                    Severity::Info,
                    format!(
                        "volume {} exceeds {outlier_multiplier}x the rolling median {median}",
                        bar.volume
                    ),
                ));
            }
        }

        self.window.push(bar.volume);
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use dna_instrument::{BarSource, Symbol, Timeframe};
    use rust_decimal_macros::dec;

    fn bar_with_volume(volume: Decimal) -> Bar {
        Bar::new(
            Symbol::from("AAPL"),
            Timeframe::M1,
            DateTime::UNIX_EPOCH,
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
            volume,
            BarSource::Historical,
            DateTime::UNIX_EPOCH,
        )
        .unwrap()
    }

    #[test]
    fn zero_volume_during_regular_session_warns() {
        let mut state = VolumeState::new(50);
        let issues = state.check(&bar_with_volume(Decimal::ZERO), Session::Regular, dec!(20));
        assert!(issues
            .iter()
            .any(|i| i.code == IssueCode::ZeroVolumeOutOfSession));
    }

    #[test]
    fn zero_volume_during_closed_session_is_fine() {
        let mut state = VolumeState::new(50);
        let issues = state.check(&bar_with_volume(Decimal::ZERO), Session::Closed, dec!(20));
        assert!(issues.is_empty());
    }

    #[test]
    fn large_volume_spike_is_flagged_as_outlier() {
        let mut state = VolumeState::new(50);
        for _ in 0..10 {
            state.check(&bar_with_volume(dec!(1000)), Session::Regular, dec!(20));
        }
        let issues = state.check(&bar_with_volume(dec!(50_000)), Session::Regular, dec!(20));
        assert!(issues.iter().any(|i| i.code == IssueCode::VolumeOutlier));
    }
}
