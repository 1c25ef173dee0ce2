use std::collections::HashMap;

use dna_instrument::{Bar, IndicatorValue, QualityReport, SimulationLabel};
use serde::{Deserialize, Serialize};

/// One wide row: a bar plus whatever indicator/label columns have been
/// computed for it so far, per §4.6's "single wide table" schema.
/// Indicator and label columns are null (absent from their maps/`None`)
/// until the Indicator Engine or Trade Simulator populate them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoredRow {
    pub bar: Bar,
    pub quality: QualityReport,
    pub accepted: bool,
    /// Keyed by `(family, parameters_fingerprint)`, mirroring the triple
    /// from §3.
    pub indicators: HashMap<(dna_instrument::IndicatorFamily, u64), IndicatorValue>,
    pub label: Option<SimulationLabel>,
}

impl StoredRow {
    pub fn new(bar: Bar, quality: QualityReport, accepted: bool) -> Self {
        Self {
            bar,
            quality,
            accepted,
            indicators: HashMap::new(),
            label: None,
        }
    }

    pub fn is_regular_hours(&self) -> bool {
        self.bar
            .timeframe
            .session_of(self.bar.timestamp)
            .is_regular()
    }
}
