use dna_instrument::Session;

/// Research-query filters from §4.6's secondary indices: `(symbol,
/// is_regular_hours)` and `(quality_score)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFilters {
    pub session: Option<Session>,
    pub min_quality_score: Option<u8>,
    pub accepted_only: bool,
}

impl QueryFilters {
    pub fn matches(&self, row: &crate::row::StoredRow) -> bool {
        if self.accepted_only && !row.accepted {
            return false;
        }
        if let Some(session) = self.session {
            if row.bar.timeframe.session_of(row.bar.timestamp) != session {
                return false;
            }
        }
        if let Some(min_score) = self.min_quality_score {
            if row.quality.score < min_score {
                return false;
            }
        }
        true
    }
}
