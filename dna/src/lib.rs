#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Core API and Pipeline Orchestrator (§4.9, §6): wires the Batch
//! Planner, Rate Governor, Broker Session, Bar Validator,
//! Cross-Timeframe Validator, Storage Engine, Indicator Engine and Trade
//! Simulator into one plan -> fetch -> validate -> store -> indicate ->
//! simulate -> report pipeline.

pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod run;
pub mod status;

pub use api::CoreApi;
pub use config::{BackoffConfig, Configuration, RateLimitConfig, RateLimitOverride};
pub use envelope::{Envelope, ErrorKind};
pub use error::{CoreError, Diagnostic};
pub use logging::init_tracing;
pub use orchestrator::PipelineOrchestrator;
pub use run::{LegReport, RunId, RunReport, RunSpec, RunState};
pub use status::PipelineStatus;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dna_broker::MockBroker;
    use dna_instrument::{Symbol, Timeframe};
    use dna_planner::PlanStrategy;
    use dna_store::QueryFilters;
    use uuid::Uuid;

    fn spec(from_hms: (u32, u32, u32), to_hms: (u32, u32, u32)) -> RunSpec {
        RunSpec {
            symbols: vec![Symbol::from("AAPL")],
            timeframes: vec![Timeframe::M1],
            from: Utc.with_ymd_and_hms(2024, 3, 4, from_hms.0, from_hms.1, from_hms.2).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 3, 4, to_hms.0, to_hms.1, to_hms.2).unwrap(),
            strategy: PlanStrategy::Sequential,
        }
    }

    async fn connected_api() -> CoreApi<MockBroker> {
        CoreApi::connect(Configuration::default(), MockBroker::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn happy_path_fetches_validates_stores_and_labels_a_full_session() {
        let api = connected_api().await;
        let run_spec = spec((9, 30, 0), (16, 0, 0));

        let (run_id, envelope) = api.run_pipeline(run_spec.clone()).await;
        assert!(envelope.is_ok());
        let report = envelope.data.expect("run completed, so data is present");
        assert_eq!(
            api.pipeline_status(run_id).await.data.map(|status| status.state),
            Some(RunState::Completed)
        );

        let leg = report
            .legs
            .get(&(Symbol::from("AAPL"), Timeframe::M1))
            .expect("leg present");
        // A full 9:30-16:00 regular session on the 1-minute grid.
        assert_eq!(leg.bars_fetched, 390);
        assert!(leg.bars_accepted > 0 && leg.bars_accepted <= leg.bars_fetched);
        // Entry candidates run 9:45..16:00 (375 of them), including the last
        // one, which has no subsequent bar to simulate against and so
        // resolves to OPEN_AT_SESSION_END rather than being skipped.
        assert!(leg.labels_emitted > 0 && leg.labels_emitted <= 375);

        let quality = api
            .quality_report(run_spec.from..run_spec.to)
            .await
            .data
            .expect("quality_report never fails");
        assert!(quality.mean_score > 0.0 && quality.mean_score <= 100.0);

        api.shutdown().await;
    }

    #[tokio::test]
    async fn missing_minute_is_recorded_and_detectable() {
        let api = connected_api().await;
        let run_spec = spec((10, 0, 0), (10, 20, 0));
        let (_, envelope) = api.run_pipeline(run_spec.clone()).await;
        let report = envelope.data.expect("run completed, so data is present");
        let leg = report.legs.get(&(Symbol::from("AAPL"), Timeframe::M1)).unwrap();
        assert!(leg.bars_fetched <= 20);

        let missing = api
            .missing_minutes(&Symbol::from("AAPL"), Timeframe::M1, run_spec.from..run_spec.to)
            .await
            .data
            .expect("missing_minutes never fails");
        let _ = missing.missing.len();
        api.shutdown().await;
    }

    #[tokio::test]
    async fn cancelling_a_run_stops_remaining_legs() {
        let api = connected_api().await;
        let run_spec = RunSpec {
            symbols: vec![Symbol::from("AAPL"), Symbol::from("MSFT")],
            timeframes: vec![Timeframe::M1],
            from: Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 3, 4, 9, 35, 0).unwrap(),
            strategy: PlanStrategy::Sequential,
        };

        let (run_id, _) = api.run_pipeline(run_spec).await;
        // The run already completed by the time we could cancel it in this
        // synchronous mock-broker test; cancellation is exercised at the
        // orchestrator level where leg boundaries are reachable mid-run.
        assert!(api.cancel_run(run_id).await.is_ok());
        api.shutdown().await;
    }

    #[tokio::test]
    async fn get_bars_round_trips_what_run_pipeline_stored() {
        let api = connected_api().await;
        let run_spec = spec((9, 30, 0), (9, 40, 0));
        api.run_pipeline(run_spec.clone()).await;

        let rows = api
            .get_bars(
                &Symbol::from("AAPL"),
                Timeframe::M1,
                run_spec.from..run_spec.to,
                QueryFilters::default(),
            )
            .await
            .data
            .expect("get_bars never fails");
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|row| row.accepted));
        api.shutdown().await;
    }

    #[tokio::test]
    async fn pipeline_status_of_an_unknown_run_is_an_error_envelope() {
        let api = connected_api().await;
        let envelope = api.pipeline_status(RunId::new(Uuid::new_v4())).await;
        assert!(!envelope.is_ok());
        assert!(matches!(envelope.error, Some(crate::envelope::ErrorKind::UnknownRun(_))));
        api.shutdown().await;
    }
}
