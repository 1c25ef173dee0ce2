use std::collections::HashMap;

use dna_instrument::{Bar, QualityReport, Symbol, Timeframe};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::movement::MovementState;
use crate::ohlc;
use crate::timeseries::{self, TimeSeriesState};
use crate::volume::VolumeState;

/// Per-(symbol, timeframe) rolling state the last three layers need to
/// stay stateful across a stream of bars, per §4.4.
#[derive(Debug, Clone)]
struct SeriesState {
    time_series: TimeSeriesState,
    movement: MovementState,
    volume: VolumeState,
}

impl SeriesState {
    fn new(config: &ValidatorConfig) -> Self {
        Self {
            time_series: TimeSeriesState::new(),
            movement: MovementState::new(config.movement_window),
            volume: VolumeState::new(config.volume_window),
        }
    }
}

/// The Bar Validator from §4.4: runs the four quality layers over a stream
/// of bars, keeping one rolling-window state per (symbol, timeframe).
#[derive(Debug, Default)]
pub struct BarValidator {
    config: ValidatorConfig,
    series: HashMap<(Symbol, Timeframe), SeriesState>,
}

impl BarValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            series: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Scores a single bar, updating this validator's rolling state for its
    /// (symbol, timeframe) key. ERROR-layer issues short-circuit the
    /// remaining layers since an OHLC violation makes every other finding
    /// meaningless.
    pub fn validate(&mut self, bar: &Bar) -> QualityReport {
        let mut report = QualityReport::perfect();

        if let Some(issue) = ohlc::check(bar) {
            report.push(issue, self.config.penalty_weights.ohlc_logic);
            debug!(symbol = %bar.symbol, timeframe = %bar.timeframe, timestamp = %bar.timestamp, score = report.score, "bar rejected at OHLC layer");
            return report;
        }

        let key = (bar.symbol.clone(), bar.timeframe);
        let state = self
            .series
            .entry(key)
            .or_insert_with(|| SeriesState::new(&self.config));

        let (session, ts_issues) = state.time_series.check(bar);
        for issue in ts_issues {
            let penalty = timeseries::penalty_for(issue.code, &self.config.penalty_weights);
            report.push(issue, penalty);
        }

        for issue in state.movement.check(
            bar,
            session,
            &self.config.movement_tolerance,
            self.config.movement_std_dev_multiplier,
        ) {
            report.push(issue, self.config.penalty_weights.excessive_movement);
        }

        for issue in state.volume.check(bar, session, self.config.volume_outlier_multiplier) {
            let penalty = match issue.code {
                dna_instrument::IssueCode::ZeroVolumeOutOfSession => {
                    self.config.penalty_weights.zero_volume_out_of_session
                }
                dna_instrument::IssueCode::VolumeOutlier => self.config.penalty_weights.volume_outlier,
                _ => 0,
            };
            report.push(issue, penalty);
        }

        report
    }

    /// True iff `report` clears this validator's acceptance threshold.
    pub fn accepts(&self, report: &QualityReport) -> bool {
        report.is_accepted(self.config.acceptance_threshold)
    }
}
