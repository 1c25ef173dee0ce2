use dna_broker::SessionError;
use dna_instrument::{BarKey, IndicatorFamily, Symbol, Timeframe};
use dna_integration::GovernorError;
use dna_store::StoreError;
use thiserror::Error;

use crate::run::RunId;

/// Errors the Core API and Pipeline Orchestrator can surface (§7).
///
/// Propagation policy: transient broker/governor failures are retried
/// inside their own subsystem and only reach here once that subsystem
/// has given up ([`CoreError::Throttled`], [`CoreError::SessionUnavailable`]
/// with a transient [`SessionError`]). Per-bar or per-indicator findings
/// ([`CoreError::BarRejected`], [`CoreError::IndicatorWarmup`],
/// [`CoreError::SimulationIndeterminate`], [`CoreError::MissingRange`]) are
/// accumulated into the run's diagnostics rather than aborting the run —
/// one symbol's rejected bar never blocks another symbol's bars. Every
/// other variant is fatal: the run stops without writing a partial batch,
/// since [`dna_store::BarStore`] only ever commits whole batches.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration is invalid: {0}")]
    ConfigInvalid(String),

    #[error("broker session unavailable: {0}")]
    SessionUnavailable(#[from] SessionError),

    #[error("request exhausted its retry budget: {0}")]
    Throttled(String),

    #[error("bar {bar_ref:?} rejected at quality score {score} (threshold {threshold})")]
    BarRejected {
        bar_ref: BarKey,
        score: u8,
        threshold: u8,
    },

    #[error("store refused to apply a conflicting write for {0:?}")]
    StoreConflict(BarKey),

    #[error("storage engine error: {0}")]
    StoreIOError(#[from] StoreError),

    #[error("{symbol}/{timeframe} has {count} missing regular-session bar(s) in the requested range")]
    MissingRange {
        symbol: Symbol,
        timeframe: Timeframe,
        count: usize,
    },

    #[error("{family} is still warming up at {bar_ref:?}")]
    IndicatorWarmup {
        bar_ref: BarKey,
        family: IndicatorFamily,
    },

    #[error("simulation anchored at {0:?} ended in an indeterminate tie-break")]
    SimulationIndeterminate(BarKey),

    #[error("run {0} was cancelled")]
    Cancelled(RunId),

    #[error("run {0} is unknown to this process")]
    UnknownRun(RunId),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl From<GovernorError> for CoreError {
    fn from(err: GovernorError) -> Self {
        match err {
            GovernorError::RetriesExhausted(_, message) => CoreError::Throttled(message),
            GovernorError::Fatal(_, message) => CoreError::InternalInvariant(message),
            other => CoreError::InternalInvariant(other.to_string()),
        }
    }
}

/// One accumulated warning-level finding attached to a [`crate::run::RunReport`]
/// rather than aborting the run (§7's "warnings/info accumulated" policy).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Diagnostic {
    BarRejected {
        bar_ref: BarKey,
        score: u8,
    },
    MissingRange {
        symbol: Symbol,
        timeframe: Timeframe,
        count: usize,
    },
    IndicatorWarmup {
        bar_ref: BarKey,
        family: IndicatorFamily,
    },
    SimulationIndeterminate {
        bar_ref: BarKey,
    },
    CrossTfMismatch {
        coarse_bar_ref: BarKey,
    },
}

impl From<CoreError> for Option<Diagnostic> {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BarRejected { bar_ref, score, .. } => Some(Diagnostic::BarRejected { bar_ref, score }),
            CoreError::MissingRange {
                symbol,
                timeframe,
                count,
            } => Some(Diagnostic::MissingRange {
                symbol,
                timeframe,
                count,
            }),
            CoreError::IndicatorWarmup { bar_ref, family } => {
                Some(Diagnostic::IndicatorWarmup { bar_ref, family })
            }
            CoreError::SimulationIndeterminate(bar_ref) => {
                Some(Diagnostic::SimulationIndeterminate { bar_ref })
            }
            _ => None,
        }
    }
}
