use std::collections::{HashMap, HashSet};
use std::ops::Range;

use chrono::{DateTime, Utc};
use dna_instrument::{Bar, BarKey, IndicatorValue, QualityReport, SimulationLabel, Symbol, Timeframe};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::filters::QueryFilters;
use crate::missing::{self, MissingReport};
use crate::report::StorageQualityReport;
use crate::row::StoredRow;

/// Current on-disk schema version for this binary, per §4.6's migration
/// contract: the engine refuses to start against a store whose schema
/// version is newer than this.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default)]
struct StoreState {
    rows: HashMap<BarKey, StoredRow>,
}

/// The Storage Engine from §4.6: a single-writer, indexed bar store.
/// `bulk_upsert`/`mark_labels` each take the state mutex once per call and
/// never `.await` while holding it, so a batch either lands entirely or
/// not at all — there is no way to observe a partially applied batch.
#[derive(Debug)]
pub struct BarStore {
    state: Mutex<StoreState>,
    schema_version: u32,
}

impl BarStore {
    /// Opens the store, refusing if `schema_version` postdates what this
    /// binary understands.
    pub fn open(schema_version: u32) -> Result<Self, StoreError> {
        if schema_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersionTooNew {
                store: schema_version,
                binary: CURRENT_SCHEMA_VERSION,
            });
        }
        Ok(Self {
            state: Mutex::new(StoreState::default()),
            schema_version,
        })
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// `bulk_upsert` from §4.6: conflict policy is overwrite-if-higher-
    /// quality-score. A batch is applied atomically — every row is decided
    /// before any row is written.
    pub async fn bulk_upsert(&self, bars: Vec<(Bar, QualityReport, bool)>) {
        let mut state = self.state.lock().await;
        let mut applied = 0u32;
        for (bar, quality, accepted) in bars {
            let key = bar.key();
            let should_write = match state.rows.get(&key) {
                Some(existing) => quality.score >= existing.quality.score,
                None => true,
            };
            if should_write {
                let mut row = StoredRow::new(bar, quality, accepted);
                if let Some(existing) = state.rows.remove(&key) {
                    row.indicators = existing.indicators;
                    row.label = existing.label;
                }
                state.rows.insert(key, row);
                applied += 1;
            }
        }
        debug!(applied, "bulk_upsert committed");
    }

    /// `query(symbol, timeframe, range, filters)` from §4.6.
    pub async fn query(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        range: Range<DateTime<Utc>>,
        filters: QueryFilters,
    ) -> Vec<StoredRow> {
        let state = self.state.lock().await;
        let mut rows: Vec<StoredRow> = state
            .rows
            .values()
            .filter(|row| {
                row.bar.symbol == *symbol
                    && row.bar.timeframe == timeframe
                    && row.bar.timestamp >= range.start
                    && row.bar.timestamp < range.end
                    && filters.matches(row)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.bar.timestamp);
        rows
    }

    /// `detect_missing(symbol, timeframe, range)` from §4.6.
    pub async fn detect_missing(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        range: Range<DateTime<Utc>>,
    ) -> MissingReport {
        let state = self.state.lock().await;
        let present: HashSet<DateTime<Utc>> = state
            .rows
            .values()
            .filter(|row| row.bar.symbol == *symbol && row.bar.timeframe == timeframe)
            .map(|row| row.bar.timestamp)
            .collect();
        missing::detect_missing(timeframe, range.start, range.end, &present)
    }

    /// `quality_report(range)` from §4.6: aggregated counts across every
    /// stored row whose timestamp falls in `range`, regardless of symbol
    /// or timeframe.
    pub async fn quality_report(&self, range: Range<DateTime<Utc>>) -> StorageQualityReport {
        let state = self.state.lock().await;
        let mut report = StorageQualityReport::default();
        let mut score_sum: u64 = 0;

        for row in state.rows.values() {
            if row.bar.timestamp < range.start || row.bar.timestamp >= range.end {
                continue;
            }
            report.rows_scanned += 1;
            if row.accepted {
                report.rows_accepted += 1;
            }
            score_sum += u64::from(row.quality.score);
            for issue in &row.quality.issues {
                *report.by_code.entry(issue.code).or_insert(0) += 1;
                *report.by_severity.entry(issue.severity).or_insert(0) += 1;
            }
        }

        report.mean_score = if report.rows_scanned == 0 {
            0.0
        } else {
            score_sum as f64 / f64::from(report.rows_scanned)
        };
        report
    }

    /// Writes computed indicator values onto their owning rows, keyed by
    /// `(family, parameters_fingerprint)` (§4.6, §4.7). A value whose
    /// `bar_ref` is not present in the store is dropped silently: the
    /// Indicator Engine may run ahead of a row that was since evicted by a
    /// lower-quality overwrite.
    pub async fn record_indicators(&self, values: Vec<IndicatorValue>) {
        let mut state = self.state.lock().await;
        let mut applied = 0u32;
        for value in values {
            if let Some(row) = state.rows.get_mut(&value.bar_ref) {
                row.indicators
                    .insert((value.family, value.parameters_fingerprint), value);
                applied += 1;
            }
        }
        debug!(applied, "indicator values recorded");
    }

    /// `mark_labels(labels)` from §4.6: idempotent — writing the same
    /// label twice leaves the store unchanged on the second call. Fails
    /// the whole batch if any label references a bar that is not present
    /// and accepted, per §4.8's "a queryable label always refers to a
    /// stored, accepted bar" guarantee.
    pub async fn mark_labels(&self, labels: Vec<SimulationLabel>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        for label in &labels {
            match state.rows.get(&label.bar_ref) {
                Some(row) if row.accepted => {}
                _ => return Err(StoreError::LabelWithoutAcceptedBar(label.bar_ref.clone())),
            }
        }

        for label in labels {
            if let Some(row) = state.rows.get_mut(&label.bar_ref) {
                row.label = Some(label);
            }
        }
        info!("labels committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_instrument::{BarSource, QualityReport};
    use rust_decimal_macros::dec;

    fn bar(symbol: &str, ts: DateTime<Utc>) -> Bar {
        Bar::new(
            Symbol::from(symbol),
            Timeframe::M1,
            ts,
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
            dec!(1000),
            BarSource::Historical,
            ts,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn higher_quality_score_overwrites_lower() {
        let store = BarStore::open(CURRENT_SCHEMA_VERSION).unwrap();
        let ts = DateTime::UNIX_EPOCH;
        let mut low = QualityReport::perfect();
        low.score = 60;
        store
            .bulk_upsert(vec![(bar("AAPL", ts), low, false)])
            .await;

        store
            .bulk_upsert(vec![(bar("AAPL", ts), QualityReport::perfect(), true)])
            .await;

        let rows = store
            .query(
                &Symbol::from("AAPL"),
                Timeframe::M1,
                ts..(ts + chrono::Duration::minutes(1)),
                QueryFilters::default(),
            )
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quality.score, 100);
    }

    #[tokio::test]
    async fn lower_quality_score_does_not_overwrite_higher() {
        let store = BarStore::open(CURRENT_SCHEMA_VERSION).unwrap();
        let ts = DateTime::UNIX_EPOCH;
        store
            .bulk_upsert(vec![(bar("AAPL", ts), QualityReport::perfect(), true)])
            .await;

        let mut low = QualityReport::perfect();
        low.score = 10;
        store
            .bulk_upsert(vec![(bar("AAPL", ts), low, false)])
            .await;

        let rows = store
            .query(
                &Symbol::from("AAPL"),
                Timeframe::M1,
                ts..(ts + chrono::Duration::minutes(1)),
                QueryFilters::default(),
            )
            .await;
        assert_eq!(rows[0].quality.score, 100);
    }

    #[tokio::test]
    async fn mark_labels_rejects_unaccepted_bar_reference() {
        let store = BarStore::open(CURRENT_SCHEMA_VERSION).unwrap();
        let key = BarKey::new(Symbol::from("AAPL"), Timeframe::M1, DateTime::UNIX_EPOCH);
        let label = SimulationLabel {
            bar_ref: key,
            entry_price: dec!(100),
            stop_price: dec!(99),
            take_price: dec!(101),
            shares: dec!(10),
            exit_bar_ref: None,
            exit_price: None,
            exit_reason: dna_instrument::ExitReason::OpenAtSessionEnd,
            bars_to_exit: 0,
            pnl: None,
            outcome: None,
            labeled_at: DateTime::UNIX_EPOCH,
        };
        let err = store.mark_labels(vec![label]).await.unwrap_err();
        assert!(matches!(err, StoreError::LabelWithoutAcceptedBar(_)));
    }

    #[test]
    fn opening_a_store_with_a_newer_schema_is_refused() {
        let err = BarStore::open(CURRENT_SCHEMA_VERSION + 1).unwrap_err();
        assert!(matches!(err, StoreError::SchemaVersionTooNew { .. }));
    }

    #[tokio::test]
    async fn record_indicators_attaches_values_to_their_row() {
        use dna_instrument::IndicatorFamily;

        let store = BarStore::open(CURRENT_SCHEMA_VERSION).unwrap();
        let ts = DateTime::UNIX_EPOCH;
        let b = bar("AAPL", ts);
        let key = b.key();
        store
            .bulk_upsert(vec![(b, QualityReport::perfect(), true)])
            .await;

        store
            .record_indicators(vec![dna_instrument::IndicatorValue {
                bar_ref: key.clone(),
                family: IndicatorFamily::Sma,
                parameters_fingerprint: 7,
                value: dec!(100.25),
                valid: true,
                computed_at: ts,
            }])
            .await;

        let rows = store
            .query(
                &Symbol::from("AAPL"),
                Timeframe::M1,
                ts..(ts + chrono::Duration::minutes(1)),
                QueryFilters::default(),
            )
            .await;
        assert_eq!(rows[0].indicators.len(), 1);
    }
}
