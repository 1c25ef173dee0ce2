use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dna_broker::{BrokerRequest, BrokerResponsePart, BrokerSession, BrokerTransport, WhatToShow};
use dna_instrument::{Bar, ExitReason, Symbol, Timeframe};
use dna_integration::RateGovernor;
use dna_planner::{BatchPlanner, FetchTarget, PlannedRequest};
use dna_store::{BarStore, QueryFilters};
use dna_ta::IndicatorEngine;
use dna_validate::{BarValidator, CrossTfValidator};
use tokio::sync::{oneshot, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Configuration;
use crate::error::{CoreError, Diagnostic};
use crate::run::{LegReport, RunId, RunReport, RunSpec};

#[derive(Debug, Default)]
struct LegOutcome {
    bars_fetched: u32,
    bars_accepted: u32,
    bars_rejected: u32,
    indicator_values_emitted: u32,
    labels_emitted: u32,
    diagnostics: Vec<Diagnostic>,
    quality_by_code: HashMap<dna_instrument::IssueCode, u32>,
    quality_by_severity: HashMap<dna_instrument::Severity, u32>,
}

/// Folds `add` into `acc`, used to accumulate a (symbol, timeframe) key's
/// shards (each its own [`LegOutcome`]) into one outcome for that key.
fn merge_outcome(acc: &mut LegOutcome, add: LegOutcome) {
    acc.bars_fetched += add.bars_fetched;
    acc.bars_accepted += add.bars_accepted;
    acc.bars_rejected += add.bars_rejected;
    acc.indicator_values_emitted += add.indicator_values_emitted;
    acc.labels_emitted += add.labels_emitted;
    acc.diagnostics.extend(add.diagnostics);
    for (code, count) in add.quality_by_code {
        *acc.quality_by_code.entry(code).or_insert(0) += count;
    }
    for (severity, count) in add.quality_by_severity {
        *acc.quality_by_severity.entry(severity).or_insert(0) += count;
    }
}

/// The Pipeline Orchestrator from §4.9: wires the Batch Planner, Rate
/// Governor, Broker Session, Bar Validator, Cross-Timeframe Validator,
/// Storage Engine, Indicator Engine and Trade Simulator into the seven-step
/// plan -> fetch -> validate -> store -> indicate -> simulate -> report
/// flow. Legs are bounded-concurrent: one tokio task per (symbol,
/// timeframe) key, gated by a `Semaphore` sized from `worker_budget`
/// (§5's work-stealing queue keyed on (symbol, timeframe)); a fatal
/// failure on one key's task never blocks another key's (§4.9's
/// partial-failure isolation). A key's own shards still run in the
/// planner's order within that key's task.
pub struct PipelineOrchestrator<T: BrokerTransport> {
    config: Configuration,
    governor: Arc<RateGovernor<BrokerRequest, BrokerSession<T>>>,
    governor_shutdown: Mutex<Option<oneshot::Sender<()>>>,
    planner: BatchPlanner,
    store: Arc<BarStore>,
    validator: Mutex<BarValidator>,
    cross_tf: CrossTfValidator,
    indicators: Mutex<IndicatorEngine>,
    simulator: dna_sim::TradeSimulator,
    cancelled_runs: Mutex<HashSet<RunId>>,
}

impl<T: BrokerTransport> std::fmt::Debug for PipelineOrchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: BrokerTransport> PipelineOrchestrator<T> {
    /// Connects the broker session and opens the store. Fatal at startup:
    /// a failed connect or an incompatible store schema both abort before
    /// any run can be accepted, per §7.
    pub async fn new(config: Configuration, transport: T) -> Result<Self, CoreError> {
        config.validate()?;

        let session = BrokerSession::new(
            transport,
            config.broker_endpoint.clone(),
            config.broker_client_id.clone(),
        );
        session.connect().await?;

        let governor = Arc::new(RateGovernor::new(
            session,
            config.rate_limits.to_limit_table(),
            config.rate_limits.backoff.into(),
        ));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(governor.clone().run(shutdown_rx));

        let store = Arc::new(BarStore::open(config.schema_version)?);
        let validator = Mutex::new(BarValidator::new(config.validator.clone()));
        let simulator = dna_sim::TradeSimulator::new(config.simulation.clone());
        let planner = BatchPlanner::new(config.max_bars_per_request);

        Ok(Self {
            config,
            governor,
            governor_shutdown: Mutex::new(Some(shutdown_tx)),
            planner,
            store,
            validator,
            cross_tf: CrossTfValidator::default(),
            indicators: Mutex::new(IndicatorEngine::new()),
            simulator,
            cancelled_runs: Mutex::new(HashSet::new()),
        })
    }

    pub fn store(&self) -> &BarStore {
        &self.store
    }

    /// Two-phase shutdown's second half (§5): stops the Rate Governor's
    /// scheduling pump. The caller is responsible for having already
    /// stopped submitting new runs.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.governor_shutdown.lock().await.take() {
            let _ = tx.send(());
        }
    }

    pub async fn cancel_run(&self, run_id: RunId) {
        self.cancelled_runs.lock().await.insert(run_id);
    }

    async fn is_cancelled(&self, run_id: RunId) -> bool {
        self.cancelled_runs.lock().await.contains(&run_id)
    }

    /// Runs the seven-step flow for every (symbol, timeframe) leg named by
    /// `spec`, resuming each leg from its last committed timestamp so a
    /// crash-and-retry never refetches or relabels bars already stored
    /// (§4.9's resumability requirement). Keys run concurrently, bounded
    /// by `worker_budget` (§5); a given key's shards still run in the
    /// planner's order, one at a time, within that key's own task.
    pub async fn run_pipeline(self: Arc<Self>, run_id: RunId, spec: RunSpec) -> RunReport {
        let mut report = RunReport::default();
        let finest = spec.timeframes.iter().copied().min();

        let mut targets = Vec::new();
        for symbol in &spec.symbols {
            for timeframe in &spec.timeframes {
                let from = self.resume_from(symbol, *timeframe, spec.from, spec.to).await;
                if from < spec.to {
                    targets.push(FetchTarget::new(symbol.clone(), *timeframe, from..spec.to));
                }
            }
        }

        let planned = self.planner.plan(&targets, spec.strategy);
        info!(run = %run_id, legs = planned.len(), "pipeline run planned");

        let mut by_key: BTreeMap<(Symbol, Timeframe), VecDeque<PlannedRequest>> = BTreeMap::new();
        for request in planned {
            by_key
                .entry((request.symbol.clone(), request.timeframe))
                .or_default()
                .push_back(request);
        }

        let worker_budget = self
            .config
            .worker_budget
            .min(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);
        let semaphore = Arc::new(Semaphore::new(worker_budget));

        let mut tasks = JoinSet::new();
        for ((symbol, timeframe), queue) in by_key {
            let orchestrator = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let mut outcome = LegOutcome::default();
                let mut fatal_error = None;
                for request in queue {
                    if orchestrator.is_cancelled(run_id).await {
                        break;
                    }
                    match orchestrator.run_leg(&request, finest).await {
                        Ok(shard_outcome) => merge_outcome(&mut outcome, shard_outcome),
                        Err(err) => {
                            warn!(run = %run_id, %symbol, %timeframe, %err, "leg failed fatally, continuing with remaining legs");
                            fatal_error = Some(err.to_string());
                            break;
                        }
                    }
                }
                (symbol, timeframe, outcome, fatal_error)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (symbol, timeframe, outcome, fatal_error) =
                joined.expect("leg task panicked");
            let leg = report.leg_mut(symbol, timeframe);
            merge_leg(leg, &outcome);
            leg.fatal_error = fatal_error;
            for diagnostic in outcome.diagnostics {
                report.record_diagnostic(diagnostic);
            }
            for (code, count) in outcome.quality_by_code {
                *report.quality_by_code.entry(code).or_insert(0) += count;
            }
            for (severity, count) in outcome.quality_by_severity {
                *report.quality_by_severity.entry(severity).or_insert(0) += count;
            }
        }

        report.cancelled = self.is_cancelled(run_id).await;
        self.cancelled_runs.lock().await.remove(&run_id);
        report
    }

    async fn resume_from(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let existing = self
            .store
            .query(symbol, timeframe, from..to, QueryFilters::default())
            .await;
        existing
            .last()
            .map(|row| row.bar.timestamp + timeframe.duration())
            .unwrap_or(from)
    }

    async fn run_leg(
        &self,
        request: &PlannedRequest,
        finest: Option<Timeframe>,
    ) -> Result<LegOutcome, CoreError> {
        let symbol = request.symbol.clone();
        let timeframe = request.timeframe;
        let range = request.range.clone();
        let broker_request = request.clone().into_broker_request(WhatToShow::Trades);

        let ticket = self
            .governor
            .submit(broker_request.kind(), request.priority, broker_request)
            .await;
        let parts = self.governor.await_result(ticket).await?;

        let mut bars: Vec<Bar> = parts
            .into_iter()
            .filter_map(|part| match part {
                BrokerResponsePart::Bars(chunk) => Some(chunk),
                _ => None,
            })
            .flatten()
            .collect();
        bars.sort_by_key(|b| b.timestamp);

        let mut outcome = LegOutcome {
            bars_fetched: bars.len() as u32,
            ..LegOutcome::default()
        };

        let mut to_store = Vec::with_capacity(bars.len());
        let mut accepted_bars = Vec::new();
        {
            let mut validator = self.validator.lock().await;
            for bar in bars {
                let quality = validator.validate(&bar);
                let accepted = validator.accepts(&quality);
                for issue in &quality.issues {
                    *outcome.quality_by_code.entry(issue.code).or_insert(0) += 1;
                    *outcome.quality_by_severity.entry(issue.severity).or_insert(0) += 1;
                }
                if accepted {
                    outcome.bars_accepted += 1;
                    accepted_bars.push(bar.clone());
                } else {
                    outcome.bars_rejected += 1;
                    outcome.diagnostics.push(Diagnostic::BarRejected {
                        bar_ref: bar.key(),
                        score: quality.score,
                    });
                }
                to_store.push((bar, quality, accepted));
            }
        }
        self.store.bulk_upsert(to_store).await;

        if let Some(finest) = finest {
            outcome
                .diagnostics
                .extend(self.cross_validate_leg(&symbol, timeframe, finest, &accepted_bars).await);
        }

        self.compute_indicators(&symbol, timeframe, &accepted_bars, &mut outcome)
            .await;
        self.simulate_trades(&symbol, timeframe, &range.end, &accepted_bars, &mut outcome)
            .await?;

        Ok(outcome)
    }

    async fn cross_validate_leg(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        finest: Timeframe,
        bars: &[Bar],
    ) -> Vec<Diagnostic> {
        if timeframe == finest {
            return Vec::new();
        }

        let mut diagnostics = Vec::new();
        for bar in bars {
            let window = bar.timestamp..(bar.timestamp + timeframe.duration());
            let covering = self
                .store
                .query(
                    symbol,
                    finest,
                    window,
                    QueryFilters {
                        accepted_only: true,
                        ..QueryFilters::default()
                    },
                )
                .await;
            if covering.is_empty() {
                continue;
            }
            let finer_bars: Vec<Bar> = covering.into_iter().map(|row| row.bar).collect();
            if let Some(mismatch) = self.cross_tf.check(bar, &finer_bars) {
                let refetch = mismatch.refetch;
                warn!(%symbol, %timeframe, ?refetch, "cross-timeframe mismatch");
                diagnostics.push(Diagnostic::CrossTfMismatch {
                    coarse_bar_ref: bar.key(),
                });
            }
        }
        diagnostics
    }

    async fn compute_indicators(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        accepted_bars: &[Bar],
        outcome: &mut LegOutcome,
    ) {
        if accepted_bars.is_empty() {
            return;
        }

        let mut engine = self.indicators.lock().await;
        for params in &self.config.indicators {
            engine.register(symbol.clone(), timeframe, params.clone());
        }

        let mut values = Vec::new();
        for bar in accepted_bars {
            let bar_values = engine.advance(bar);
            for value in &bar_values {
                if !value.valid {
                    outcome.diagnostics.push(Diagnostic::IndicatorWarmup {
                        bar_ref: value.bar_ref.clone(),
                        family: value.family,
                    });
                }
            }
            outcome.indicator_values_emitted += bar_values.len() as u32;
            values.extend(bar_values);
        }
        drop(engine);

        self.store.record_indicators(values).await;
    }

    async fn simulate_trades(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        leg_end: &DateTime<Utc>,
        accepted_bars: &[Bar],
        outcome: &mut LegOutcome,
    ) -> Result<(), CoreError> {
        let mut labels = Vec::new();
        for bar in accepted_bars {
            if !dna_sim::TradeSimulator::is_entry_candidate(bar) {
                continue;
            }
            let subsequent_rows = self
                .store
                .query(
                    symbol,
                    timeframe,
                    (bar.timestamp + timeframe.duration())..*leg_end,
                    QueryFilters {
                        accepted_only: true,
                        ..QueryFilters::default()
                    },
                )
                .await;
            let subsequent_bars: Vec<Bar> = subsequent_rows.into_iter().map(|row| row.bar).collect();
            let label = self.simulator.simulate(bar, &subsequent_bars);
            if label.exit_reason == ExitReason::Indeterminate {
                outcome.diagnostics.push(Diagnostic::SimulationIndeterminate {
                    bar_ref: label.bar_ref.clone(),
                });
            }
            labels.push(label);
        }

        outcome.labels_emitted = labels.len() as u32;
        if !labels.is_empty() {
            self.store.mark_labels(labels).await?;
        }
        Ok(())
    }
}

fn merge_leg(leg: &mut LegReport, outcome: &LegOutcome) {
    leg.bars_fetched += outcome.bars_fetched;
    leg.bars_accepted += outcome.bars_accepted;
    leg.bars_rejected += outcome.bars_rejected;
    leg.indicator_values_emitted += outcome.indicator_values_emitted;
    leg.labels_emitted += outcome.labels_emitted;
}
