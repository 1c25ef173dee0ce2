use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dna_broker::BrokerTransport;
use dna_instrument::{Symbol, Timeframe};
use dna_store::{MissingReport, QueryFilters, StoredRow, StorageQualityReport};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::config::Configuration;
use crate::envelope::Envelope;
use crate::error::CoreError;
use crate::orchestrator::PipelineOrchestrator;
use crate::run::{RunId, RunReport, RunSpec, RunState};
use crate::status::PipelineStatus;

/// The Core API surface from §6: everything a caller outside this crate
/// is expected to depend on. Wraps the Pipeline Orchestrator and tracks
/// the state of every run it has accepted.
pub struct CoreApi<T: BrokerTransport> {
    orchestrator: Arc<PipelineOrchestrator<T>>,
    run_states: Mutex<HashMap<RunId, RunState>>,
}

impl<T: BrokerTransport> std::fmt::Debug for CoreApi<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreApi").finish_non_exhaustive()
    }
}

impl<T: BrokerTransport> CoreApi<T> {
    /// `connect(config, transport)` from §6: validates `config`, connects
    /// the broker session and opens the store.
    pub async fn connect(config: Configuration, transport: T) -> Result<Self, CoreError> {
        let orchestrator = PipelineOrchestrator::new(config, transport).await?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            run_states: Mutex::new(HashMap::new()),
        })
    }

    /// `get_bars(symbol, timeframe, range)` from §6.
    pub async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        range: Range<DateTime<Utc>>,
        filters: QueryFilters,
    ) -> Envelope<Vec<StoredRow>> {
        let rows = self.orchestrator.store().query(symbol, timeframe, range, filters).await;
        Envelope::ok(rows)
    }

    /// `get_labels(symbol, timeframe, range)` from §6: bars with a
    /// committed simulation label.
    pub async fn get_labels(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        range: Range<DateTime<Utc>>,
    ) -> Envelope<Vec<StoredRow>> {
        let rows = self
            .orchestrator
            .store()
            .query(symbol, timeframe, range, QueryFilters::default())
            .await
            .into_iter()
            .filter(|row| row.label.is_some())
            .collect();
        Envelope::ok(rows)
    }

    /// `quality_report(range)` from §6.
    pub async fn quality_report(&self, range: Range<DateTime<Utc>>) -> Envelope<StorageQualityReport> {
        let report = self.orchestrator.store().quality_report(range).await;
        Envelope::ok(report)
    }

    /// `missing_minutes(symbol, timeframe, range)` from §6.
    pub async fn missing_minutes(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        range: Range<DateTime<Utc>>,
    ) -> Envelope<MissingReport> {
        let report = self.orchestrator.store().detect_missing(symbol, timeframe, range).await;
        Envelope::ok(report)
    }

    /// `pipeline_status(run_id)` from §6: [`CoreError::UnknownRun`] if this
    /// process never accepted `run_id`.
    pub async fn pipeline_status(&self, run_id: RunId) -> Envelope<PipelineStatus> {
        let states = self.run_states.lock().await;
        match states.get(&run_id) {
            Some(state) => Envelope::ok(PipelineStatus {
                run_id,
                state: *state,
            }),
            None => Envelope::err(&CoreError::UnknownRun(run_id)),
        }
    }

    /// `run_pipeline(spec)` from §6: mints a fresh [`RunId`] and runs the
    /// full plan -> fetch -> validate -> store -> indicate -> simulate ->
    /// report flow to completion (or cancellation), recording state
    /// transitions as it goes.
    pub async fn run_pipeline(&self, spec: RunSpec) -> (RunId, Envelope<RunReport>) {
        let run_id = RunId::new(Uuid::new_v4());
        self.set_state(run_id, RunState::Planning).await;
        info!(run = %run_id, "pipeline run accepted");

        self.set_state(run_id, RunState::Fetching).await;
        let report = Arc::clone(&self.orchestrator).run_pipeline(run_id, spec).await;

        let final_state = if report.cancelled {
            RunState::Cancelled
        } else if report.legs.values().any(|leg| leg.fatal_error.is_some())
            && report.legs.values().all(|leg| leg.fatal_error.is_some())
        {
            RunState::Failed
        } else {
            RunState::Completed
        };
        self.set_state(run_id, final_state).await;

        let envelope = if report.cancelled {
            let mut envelope = Envelope::err(&CoreError::Cancelled(run_id));
            envelope.diagnostics = report.diagnostics;
            envelope
        } else {
            Envelope::ok_with_diagnostics(report.clone(), report.diagnostics)
        };

        (run_id, envelope)
    }

    /// `cancel_run(run_id)` from §6: cooperative, takes effect at the next
    /// leg boundary.
    pub async fn cancel_run(&self, run_id: RunId) -> Envelope<()> {
        self.orchestrator.cancel_run(run_id).await;
        Envelope::ok(())
    }

    /// `shutdown()` from §6, §5's two-phase shutdown: stop accepting new
    /// work before calling this, then let in-flight runs settle.
    pub async fn shutdown(&self) -> Envelope<()> {
        self.orchestrator.shutdown().await;
        Envelope::ok(())
    }

    async fn set_state(&self, run_id: RunId, state: RunState) {
        self.run_states.lock().await.insert(run_id, state);
    }
}
