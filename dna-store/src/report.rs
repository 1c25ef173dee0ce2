use std::collections::HashMap;

use dna_instrument::{IssueCode, Severity};
use serde::{Deserialize, Serialize};

/// `quality_report(range)` result from §4.6: aggregated counts over a
/// stored range, independent of the live validation pass that produced
/// them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageQualityReport {
    pub rows_scanned: u32,
    pub rows_accepted: u32,
    pub by_code: HashMap<IssueCode, u32>,
    pub by_severity: HashMap<Severity, u32>,
    pub mean_score: f64,
}
