//! End-to-end coverage of the pipeline's six documented scenarios, driving
//! [`CoreApi`] against [`MockBroker`] the way a real caller would: connect,
//! run, inspect the report and the store.

use chrono::{DateTime, TimeZone, Utc};
use dna::{Configuration, CoreApi, RunSpec, RunState};
use dna_broker::MockBroker;
use dna_instrument::{Bar, BarSource, IssueCode, Symbol, Timeframe};
use dna_planner::PlanStrategy;
use dna_store::QueryFilters;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
}

fn bar(symbol: &Symbol, timeframe: Timeframe, at: DateTime<Utc>, open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Bar {
    Bar::new(symbol.clone(), timeframe, at, open, high, low, close, volume, BarSource::Historical, at)
        .expect("test bar respects the OHLCV invariant")
}

fn run_spec(symbol: &Symbol, timeframe: Timeframe, from: DateTime<Utc>, to: DateTime<Utc>) -> RunSpec {
    RunSpec {
        symbols: vec![symbol.clone()],
        timeframes: vec![timeframe],
        from,
        to,
        strategy: PlanStrategy::Sequential,
    }
}

#[tokio::test]
async fn happy_path_full_session_fetches_validates_stores_and_labels() {
    let symbol = Symbol::from("AAPL");
    let api = CoreApi::connect(Configuration::default(), MockBroker::new())
        .await
        .unwrap();

    let spec = run_spec(&symbol, Timeframe::M1, ts(9, 30), ts(16, 0));
    let (run_id, envelope) = api.run_pipeline(spec.clone()).await;
    assert!(envelope.is_ok());
    let report = envelope.data.unwrap();

    assert_eq!(
        api.pipeline_status(run_id).await.data.map(|s| s.state),
        Some(RunState::Completed)
    );

    let leg = report.legs.get(&(symbol.clone(), Timeframe::M1)).expect("leg present");
    assert_eq!(leg.bars_fetched, 390);
    assert!(leg.bars_accepted > 0);
    // Entry candidates run 9:45..16:00 inclusive of the last one, which has
    // no subsequent bar to simulate against and resolves to
    // OPEN_AT_SESSION_END rather than being dropped.
    assert!(leg.labels_emitted > 0 && leg.labels_emitted <= 375);
    assert!(leg.fatal_error.is_none());

    let rows = api
        .get_bars(&symbol, Timeframe::M1, spec.from..spec.to, QueryFilters::default())
        .await
        .data
        .unwrap();
    assert_eq!(rows.len() as u32, leg.bars_fetched);

    api.shutdown().await;
}

#[tokio::test]
async fn missing_minute_is_recorded_and_detectable() {
    let symbol = Symbol::from("AAPL");
    let timeframe = Timeframe::M1;
    let from = ts(10, 0);
    let to = ts(10, 10);
    let gap = ts(10, 4);

    let full = (0..10)
        .map(|i| {
            let at = from + chrono::Duration::minutes(i);
            bar(&symbol, timeframe, at, dec!(100), dec!(100.3), dec!(99.7), dec!(100.05), dec!(1000))
        })
        .filter(|b| b.timestamp != gap)
        .collect::<Vec<_>>();

    let broker = MockBroker::new().with_override(symbol.clone(), timeframe, full);
    let api = CoreApi::connect(Configuration::default(), broker).await.unwrap();

    let spec = run_spec(&symbol, timeframe, from, to);
    let (_, envelope) = api.run_pipeline(spec.clone()).await;
    let report = envelope.data.unwrap();
    let leg = report.legs.get(&(symbol.clone(), timeframe)).unwrap();
    assert_eq!(leg.bars_fetched, 9);

    let missing = api.missing_minutes(&symbol, timeframe, from..to).await.data.unwrap();
    assert_eq!(missing.missing, vec![gap]);

    api.shutdown().await;
}

#[tokio::test]
async fn ohlc_violation_is_rejected_and_counted_in_quality_report() {
    let symbol = Symbol::from("AAPL");
    let timeframe = Timeframe::M1;
    let from = ts(10, 0);
    let to = ts(10, 3);

    // Negative, but internally consistent, OHLCV — Bar::new allows it since
    // low <= min(open,close) <= max(open,close) <= high still holds; the
    // OHLC layer catches the negative prices defensively.
    let broken = bar(&symbol, timeframe, ts(10, 1), dec!(-5), dec!(-2), dec!(-6), dec!(-3), dec!(1000));
    let bars = vec![
        bar(&symbol, timeframe, ts(10, 0), dec!(100), dec!(100.3), dec!(99.7), dec!(100.05), dec!(1000)),
        broken,
        bar(&symbol, timeframe, ts(10, 2), dec!(100), dec!(100.3), dec!(99.7), dec!(100.05), dec!(1000)),
    ];

    let broker = MockBroker::new().with_override(symbol.clone(), timeframe, bars);
    let api = CoreApi::connect(Configuration::default(), broker).await.unwrap();

    let spec = run_spec(&symbol, timeframe, from, to);
    let (_, envelope) = api.run_pipeline(spec).await;
    let report = envelope.data.unwrap();
    let leg = report.legs.get(&(symbol, timeframe)).unwrap();

    assert_eq!(leg.bars_fetched, 3);
    assert_eq!(leg.bars_rejected, 1);
    assert_eq!(leg.bars_accepted, 2);
    assert_eq!(report.quality_by_code.get(&IssueCode::OhlcLogic), Some(&1));

    api.shutdown().await;
}

#[tokio::test]
async fn take_profit_fill_resolves_at_the_next_bars_open() {
    let symbol = Symbol::from("AAPL");
    let timeframe = Timeframe::M1;
    let entry_at = ts(9, 45);

    // Entry at 100 with the default 0.5% take / 0.4% stop puts take at
    // 100.50 and stop at 99.60. The second bar's high clears take without
    // also clearing stop; the third bar's open is the fill price.
    let bars = vec![
        bar(&symbol, timeframe, entry_at, dec!(100), dec!(100.10), dec!(99.90), dec!(100.05), dec!(1000)),
        bar(&symbol, timeframe, entry_at + chrono::Duration::minutes(1), dec!(100.10), dec!(100.80), dec!(100.00), dec!(100.60), dec!(1000)),
        bar(&symbol, timeframe, entry_at + chrono::Duration::minutes(2), dec!(100.90), dec!(101.00), dec!(100.70), dec!(100.95), dec!(1000)),
    ];
    let to = entry_at + chrono::Duration::minutes(3);

    let broker = MockBroker::new().with_override(symbol.clone(), timeframe, bars);
    let api = CoreApi::connect(Configuration::default(), broker).await.unwrap();

    let spec = run_spec(&symbol, timeframe, entry_at, to);
    api.run_pipeline(spec.clone()).await;

    let rows = api.get_labels(&symbol, timeframe, entry_at..to).await.data.unwrap();
    let entry_row = rows.iter().find(|row| row.bar.timestamp == entry_at).expect("entry bar labeled");
    let label = entry_row.label.as_ref().expect("entry bar has a label");

    assert_eq!(label.exit_reason, dna_instrument::ExitReason::TakeProfit);
    assert_eq!(label.exit_price, Some(dec!(100.90)));

    api.shutdown().await;
}

#[tokio::test]
async fn forced_close_fires_thirty_minutes_before_after_hours_ends() {
    let symbol = Symbol::from("AAPL");
    let timeframe = Timeframe::M15;
    let entry_at = ts(9, 45);
    let cutoff = ts(19, 30);
    let to = ts(19, 45);

    // A flat price path, never close enough to the default 0.4%/0.5%
    // stop/take to trigger either, all the way to the forced-close cutoff.
    let mut bars = Vec::new();
    let mut at = entry_at;
    while at < to {
        bars.push(bar(&symbol, timeframe, at, dec!(100), dec!(100.10), dec!(99.90), dec!(100.02), dec!(1000)));
        at += timeframe.duration();
    }

    let broker = MockBroker::new().with_override(symbol.clone(), timeframe, bars);
    let api = CoreApi::connect(Configuration::default(), broker).await.unwrap();

    let spec = run_spec(&symbol, timeframe, entry_at, to);
    api.run_pipeline(spec.clone()).await;

    let rows = api.get_labels(&symbol, timeframe, entry_at..to).await.data.unwrap();
    let entry_row = rows.iter().find(|row| row.bar.timestamp == entry_at).expect("entry bar labeled");
    let label = entry_row.label.as_ref().expect("entry bar has a label");

    assert_eq!(label.exit_reason, dna_instrument::ExitReason::ForcedClose);
    assert_eq!(label.exit_bar_ref.as_ref().map(|k| k.timestamp), Some(cutoff));

    api.shutdown().await;
}

#[tokio::test]
async fn throttled_request_is_retried_and_eventually_succeeds() {
    let symbol = Symbol::from("AAPL");
    let timeframe = Timeframe::M1;
    let from = ts(9, 30);
    let to = ts(9, 35);

    let mut config = Configuration::default();
    config.rate_limits.backoff.base_secs = 0.01;
    config.rate_limits.backoff.cap_secs = 0.05;
    config.rate_limits.backoff.jitter = 0.0;
    config.rate_limits.backoff.max_attempts = 5;

    // Fails the first two HistoricalBars attempts with a transient throttle
    // before answering normally; well within max_attempts.
    let broker = MockBroker::new().with_throttled_historical(2);
    let api = CoreApi::connect(config, broker).await.unwrap();

    let spec = run_spec(&symbol, timeframe, from, to);
    let (_, envelope) = api.run_pipeline(spec).await;
    let report = envelope.data.expect("retries succeed within max_attempts");
    let leg = report.legs.get(&(symbol, timeframe)).unwrap();

    assert!(leg.fatal_error.is_none());
    assert_eq!(leg.bars_fetched, 5);

    api.shutdown().await;
}
