use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Severity of a [`QualityIssue`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Stable issue codes emitted by the Bar Validator and Cross-Timeframe
/// Validator (§4.4, §4.5).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    OhlcLogic,
    NegativeVolume,
    OffGrid,
    DuplicateTimestamp,
    NonMonotonic,
    ExcessiveMovement,
    ZeroVolumeOutOfSession,
    VolumeOutlier,
    CrossTfInconsistent,
    Misaligned,
}

/// One finding attached to a [`QualityReport`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QualityIssue {
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
}

impl QualityIssue {
    pub fn new(code: IssueCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
        }
    }
}

/// Default acceptance threshold from §4.4: a bar with any ERROR issue is
/// capped below this regardless of its penalty total.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: u8 = 95;

/// Per-bar validation outcome (§3).
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct QualityReport {
    pub score: u8,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn perfect() -> Self {
        Self {
            score: 100,
            issues: Vec::new(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn push(&mut self, issue: QualityIssue, penalty: u8) {
        self.score = self.score.saturating_sub(penalty);
        self.issues.push(issue);
    }

    /// Accepted iff score is at or above `threshold` and no ERROR issue is
    /// present, per §4.4.
    pub fn is_accepted(&self, threshold: u8) -> bool {
        self.score >= threshold && !self.has_error()
    }
}
