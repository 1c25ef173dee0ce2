use dna_instrument::{Bar, IssueCode, QualityIssue, Session, Severity};
use rust_decimal::Decimal;

use crate::config::MovementToleranceTable;
use crate::rolling::RollingWindow;

/// Layer 3 (§4.4): price movement. Tracks the previous bar's close and a
/// rolling window of absolute percent changes per (symbol, timeframe).
#[derive(Debug, Clone)]
pub struct MovementState {
    window: RollingWindow,
    previous_close: Option<Decimal>,
}

impl MovementState {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: RollingWindow::new(window_size),
            previous_close: None,
        }
    }

    pub fn check(
        &mut self,
        bar: &Bar,
        session: Session,
        tolerance: &MovementToleranceTable,
        std_dev_multiplier: Decimal,
    ) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        if let Some(prev_close) = self.previous_close {
            if !prev_close.is_zero() {
                let pct_change = ((bar.close - prev_close) / prev_close * Decimal::ONE_HUNDRED).abs();
                let session_limit = tolerance.tolerance_for(session);

                let mean = self.window.mean();
                let std_dev = self.window.std_dev();
                let statistical_limit = mean + std_dev * std_dev_multiplier;

                let exceeds_session_table = pct_change > session_limit;
                let exceeds_rolling_window = self.window.len() >= 2 && pct_change > statistical_limit;

                if exceeds_session_table || exceeds_rolling_window {
                    issues.push(QualityIssue::new(
                        IssueCode::ExcessiveMovement,
                        Severity::Warn,
                        format!(
                            "{pct_change}% move in {session} session exceeds tolerance (table {session_limit}%, rolling {statistical_limit}%)"
                        ),
                    ));
                }

                self.window.push(pct_change);
            }
        }

        self.previous_close = Some(bar.close);
        issues
    }
}
