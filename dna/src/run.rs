use std::collections::HashMap;
use std::ops::Range;

use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use dna_instrument::{IssueCode, Severity, Symbol, Timeframe};
use dna_planner::PlanStrategy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Diagnostic;

/// Opaque handle for one `run_pipeline` invocation (§6), returned
/// immediately so the caller can poll [`crate::api::CoreApi::pipeline_status`]
/// or call [`crate::api::CoreApi::cancel_run`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display, Constructor)]
#[display("RunId({_0})")]
pub struct RunId(pub Uuid);

/// What one `run_pipeline` call should cover (§6): the (symbol, timeframe)
/// matrix, the range to backfill, and the sequencing strategy the Batch
/// Planner should use.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunSpec {
    pub symbols: Vec<Symbol>,
    pub timeframes: Vec<Timeframe>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub strategy: PlanStrategy,
}

impl RunSpec {
    pub fn range(&self) -> Range<DateTime<Utc>> {
        self.from..self.to
    }
}

/// Per-(symbol, timeframe) outcome within a run, per §4.9's partial-failure
/// isolation: one leg failing fatally does not prevent the others from
/// completing and being reported.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LegReport {
    pub bars_fetched: u32,
    pub bars_accepted: u32,
    pub bars_rejected: u32,
    pub indicator_values_emitted: u32,
    pub labels_emitted: u32,
    pub fatal_error: Option<String>,
}

/// Result envelope for a completed (or aborted) `run_pipeline` call (§6,
/// §8): aggregate counts, diagnostics accumulated per §7's propagation
/// policy, and the acceptance-rate-style quality summary.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunReport {
    pub legs: HashMap<(Symbol, Timeframe), LegReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub quality_by_code: HashMap<IssueCode, u32>,
    pub quality_by_severity: HashMap<Severity, u32>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn leg_mut(&mut self, symbol: Symbol, timeframe: Timeframe) -> &mut LegReport {
        self.legs.entry((symbol, timeframe)).or_default()
    }

    pub fn record_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn total_bars_accepted(&self) -> u32 {
        self.legs.values().map(|leg| leg.bars_accepted).sum()
    }
}

/// Current state of a run as exposed by `pipeline_status` (§6).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Planning,
    Fetching,
    Validating,
    Storing,
    ComputingIndicators,
    Simulating,
    Completed,
    Cancelled,
    Failed,
}
